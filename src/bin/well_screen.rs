use scene_viewer::{config::ViewerConfig, viewer};

fn main() -> anyhow::Result<()> {
    viewer::run_screen_viewer(ViewerConfig::default())
}
