use scene_viewer::{config::ViewerConfig, viewer};

fn main() -> anyhow::Result<()> {
    viewer::run_viewer(ViewerConfig::default())
}
