use live_screen::{config::SceneConfig, flow, scene::LaptopScene};

fn main() -> anyhow::Result<()> {
    let scene = SceneConfig::from_env()?;
    flow::run(scene, vec![LaptopScene::constructor()])
}
