//! Texture inputs: the floor image and the six-face environment cube map,
//! decoded to RGBA8 and uploaded before the first frame. Any missing or
//! undecodable file is a fatal setup error.

use std::path::Path;

/// Floor color image, tiled across the pool bottom
pub const FLOOR_TEXTURE_PATH: &str = "assets/floor.png";

/// Directory holding the six cube faces
pub const ENVIRONMENT_DIR: &str = "assets/environment";

/// Cube face files in wgpu layer order (+X, -X, +Y, -Y, +Z, -Z)
pub const CUBE_FACE_NAMES: [&str; 6] = [
    "posx.png", "negx.png", "posy.png", "negy.png", "posz.png", "negz.png",
];

fn decode_rgba(path: &Path) -> Result<image::RgbaImage, String> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to load texture {}: {}", path.display(), e))?;
    Ok(img.to_rgba8())
}

fn upload_layer(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    layer: u32,
    pixels: &image::RgbaImage,
) {
    let (width, height) = pixels.dimensions();
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

/// Decode and upload the floor color texture.
pub fn load_floor_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<wgpu::TextureView, String> {
    let pixels = decode_rgba(Path::new(FLOOR_TEXTURE_PATH))?;
    let (width, height) = pixels.dimensions();

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Floor Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    upload_layer(queue, &texture, 0, &pixels);

    log::info!("Loaded floor texture {}x{}", width, height);
    Ok(texture.create_view(&wgpu::TextureViewDescriptor::default()))
}

/// Decode the six environment faces and assemble a cube-sampled texture.
///
/// All faces must be square and share one size.
pub fn load_environment_cubemap(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<wgpu::TextureView, String> {
    let dir = Path::new(ENVIRONMENT_DIR);
    let faces: Vec<image::RgbaImage> = CUBE_FACE_NAMES
        .iter()
        .map(|name| decode_rgba(&dir.join(name)))
        .collect::<Result<_, _>>()?;

    let (width, height) = faces[0].dimensions();
    if width != height {
        return Err(format!(
            "Environment faces must be square, got {}x{}",
            width, height
        ));
    }
    for (face, name) in faces.iter().zip(CUBE_FACE_NAMES) {
        if face.dimensions() != (width, height) {
            return Err(format!(
                "Environment face {} is {}x{}, expected {}x{}",
                name,
                face.dimensions().0,
                face.dimensions().1,
                width,
                height
            ));
        }
    }

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Environment Cubemap"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (layer, face) in faces.iter().enumerate() {
        upload_layer(queue, &texture, layer as u32, face);
    }

    log::info!("Loaded environment cubemap, {}px faces", width);
    Ok(texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Environment Cubemap View"),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    }))
}
