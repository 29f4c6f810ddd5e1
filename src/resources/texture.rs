use anyhow::Context as _;

use crate::data_structures::texture;

/// Layout of a material bind group: base colour texture, its sampler and the
/// base colour factor.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("Model material_bind_group_layout"),
    })
}

/// Resolve `uri` relative to the file that referenced it.
pub fn resolve_relative(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no window available")?;
    let origin = window
        .location()
        .origin()
        .map_err(|err| anyhow::anyhow!("cannot read location origin: {err:?}"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))?;
    Ok(base.join(file_name.trim_start_matches('/'))?)
}

/// Where native builds look for `file_name`: `./assets` first, then the
/// copy the build script leaves in `OUT_DIR`.
#[cfg(not(target_arch = "wasm32"))]
fn asset_candidates(file_name: &str) -> [std::path::PathBuf; 2] {
    let relative = file_name.trim_start_matches('/');
    [
        std::path::Path::new("./assets").join(relative),
        std::path::Path::new(env!("OUT_DIR")).join("assets").join(relative),
    ]
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        let response = reqwest::get(url.clone()).await?.error_for_status()?;
        response
            .bytes()
            .await
            .with_context(|| format!("reading {url}"))?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let candidates = asset_candidates(file_name);
        let path = candidates
            .iter()
            .find(|path| path.is_file())
            .unwrap_or(&candidates[0]);
        log::debug!("reading {}", path.display());
        tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?
    };

    Ok(data)
}

pub async fn load_texture(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    format: Option<&str>,
) -> anyhow::Result<texture::Texture> {
    let data = load_binary(file_name).await?;
    texture::Texture::from_bytes(device, queue, &data, file_name, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_uris_sit_next_to_the_model() {
        assert_eq!(
            resolve_relative("models/well.gltf", "well.bin"),
            "models/well.bin"
        );
        assert_eq!(resolve_relative("well.gltf", "well.bin"), "well.bin");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn native_reads_fall_back_to_the_build_copy() {
        let [local, built] = asset_candidates("/models/well.glb");
        assert_eq!(local, std::path::Path::new("./assets/models/well.glb"));
        let built_root = std::path::Path::new(env!("OUT_DIR")).join("assets");
        assert_eq!(built, built_root.join("models/well.glb"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn missing_assets_name_the_path_tried() {
        let err = load_binary("models/does-not-exist.glb").await.unwrap_err();
        assert!(format!("{err:#}").contains("assets/models/does-not-exist.glb"));
    }
}
