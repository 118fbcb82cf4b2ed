//! GPU side of the reveal effect: the mask feedback pass and the composite pass.

use bytemuck::{Pod, Zeroable};
use tracing::{debug, info, warn};

use crate::config::{Configuration, MaskBackend};
use crate::events::{ImageSlot, PreparedImage};
use crate::layout::{self, PlaneSize};
use crate::mask::MaskField;
use crate::mask::kernel::{PAINT_GAIN, decay_amount};
use crate::render::loader;
use crate::session::FrameInputs;

// Full f32 storage: half floats round small per-frame decays away near 1.0.
const GPU_MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
const CPU_MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MaskUniforms {
    pointer: [f32; 2],
    aspect: f32,
    active: f32,
    time: f32,
    decay: f32,
    radius: f32,
    paint_gain: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct LayerUniforms {
    screen_size: [f32; 2],
    plane_size: [f32; 2],
    threshold: f32,
    use_mask: u32,
    _pad: [f32; 2],
}

struct MaskTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MaskTexture {
    fn new(
        device: &wgpu::Device,
        label: &str,
        (width, height): (u32, u32),
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Render target written by the mask pass plus the copy read back next frame.
struct GpuMask {
    target: MaskTexture,
    feedback: MaskTexture,
    update_bind: wgpu::BindGroup,
}

struct CpuMask {
    field: MaskField,
    texture: MaskTexture,
    staging: Vec<u8>,
}

enum MaskStore {
    Gpu(GpuMask),
    Cpu(CpuMask),
}

impl MaskStore {
    fn sampled_view(&self) -> &wgpu::TextureView {
        match self {
            Self::Gpu(mask) => &mask.target.view,
            Self::Cpu(mask) => &mask.texture.view,
        }
    }

    fn destroy(self) {
        match self {
            Self::Gpu(mask) => {
                mask.target.texture.destroy();
                mask.feedback.texture.destroy();
            }
            Self::Cpu(mask) => mask.texture.texture.destroy(),
        }
    }
}

struct Layer {
    texture: wgpu::Texture,
    uniforms: wgpu::Buffer,
    bind: wgpu::BindGroup,
    image_size: (u32, u32),
    plane: Option<PlaneSize>,
}

impl Layer {
    fn destroy(self) {
        self.texture.destroy();
        self.uniforms.destroy();
    }
}

fn srgb_to_linear(c: u8) -> f64 {
    let c = f64::from(c) / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Owns every GPU resource of one reveal instance.
///
/// Nothing here is shared between instances; [`release`](Self::release)
/// frees it all and is safe to call more than once.
pub struct RevealRenderer {
    backend: MaskBackend,
    resolution_scale: f32,
    threshold: f32,
    background: wgpu::Color,
    mask_pipeline: wgpu::RenderPipeline,
    mask_layout: wgpu::BindGroupLayout,
    mask_uniforms: wgpu::Buffer,
    composite_pipeline: wgpu::RenderPipeline,
    layer_layout: wgpu::BindGroupLayout,
    sample_layout: wgpu::BindGroupLayout,
    image_sampler: wgpu::Sampler,
    mask_sampler: wgpu::Sampler,
    mask: Option<MaskStore>,
    mask_bind: Option<wgpu::BindGroup>,
    mask_size: Option<(u32, u32)>,
    layers: [Option<Layer>; 2],
    surface: (u32, u32),
    released: bool,
}

impl RevealRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        cfg: &Configuration,
    ) -> Self {
        let mask_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("reveal-mask-shader"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(include_str!(
                "shaders/mask.wgsl"
            ))),
        });
        let composite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("reveal-composite-shader"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(include_str!(
                "shaders/composite.wgsl"
            ))),
        });

        let mask_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("reveal-mask-uniforms"),
            size: std::mem::size_of::<MaskUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mask_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("reveal-mask-update-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let layer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("reveal-layer-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sample_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("reveal-mask-sample-layout"),
            entries: &[
                // R32Float is not filterable without an extra device feature.
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let image_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("reveal-image-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let mask_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("reveal-mask-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mask_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("reveal-mask-pipeline-layout"),
            bind_group_layouts: &[&mask_layout],
            push_constant_ranges: &[],
        });
        let mask_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("reveal-mask-pipeline"),
            layout: Some(&mask_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &mask_shader,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &mask_shader,
                entry_point: Some("fs_mask"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: GPU_MASK_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("reveal-composite-pipeline-layout"),
                bind_group_layouts: &[&layer_layout, &sample_layout],
                push_constant_ranges: &[],
            });
        let composite_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("reveal-composite-pipeline"),
            layout: Some(&composite_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &composite_shader,
                entry_point: Some("vs_plane"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &composite_shader,
                entry_point: Some("fs_plane"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let [r, g, b] = cfg.window.background;
        Self {
            backend: cfg.mask.backend,
            resolution_scale: cfg.mask.resolution_scale,
            threshold: cfg.reveal.threshold,
            background: wgpu::Color {
                r: srgb_to_linear(r),
                g: srgb_to_linear(g),
                b: srgb_to_linear(b),
                a: 1.0,
            },
            mask_pipeline,
            mask_layout,
            mask_uniforms,
            composite_pipeline,
            layer_layout,
            sample_layout,
            image_sampler,
            mask_sampler,
            mask: None,
            mask_bind: None,
            mask_size: None,
            layers: [None, None],
            surface: (0, 0),
            released: false,
        }
    }

    /// Reallocate size-dependent resources and re-fit both planes.
    ///
    /// The mask restarts from zero at the new resolution. A zero-area
    /// surface drops the mask until a usable size arrives.
    pub fn resize(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) {
        if self.released {
            return;
        }
        self.surface = (width, height);

        let dims = layout::mask_dims(width, height, self.resolution_scale);
        if dims != self.mask_size {
            if let Some(old) = self.mask.take() {
                old.destroy();
            }
            self.mask_bind = None;
            self.mask_size = dims;
            if let Some(dims) = dims {
                let store = self.create_mask(device, dims);
                self.mask_bind = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("reveal-mask-sample-bind"),
                    layout: &self.sample_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(store.sampled_view()),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.mask_sampler),
                        },
                    ],
                }));
                self.mask = Some(store);
            }
            debug!(
                surface_w = width,
                surface_h = height,
                mask = ?dims,
                backend = ?self.backend,
                "mask targets reallocated"
            );
        }

        for slot in ImageSlot::ALL {
            self.refit_layer(queue, slot);
        }
    }

    fn create_mask(&self, device: &wgpu::Device, dims: (u32, u32)) -> MaskStore {
        match self.backend {
            MaskBackend::Gpu => {
                let target = MaskTexture::new(
                    device,
                    "reveal-mask-target",
                    dims,
                    GPU_MASK_FORMAT,
                    wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_SRC,
                );
                let feedback = MaskTexture::new(
                    device,
                    "reveal-mask-feedback",
                    dims,
                    GPU_MASK_FORMAT,
                    wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                );
                let update_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("reveal-mask-update-bind"),
                    layout: &self.mask_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: self.mask_uniforms.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&feedback.view),
                        },
                    ],
                });
                MaskStore::Gpu(GpuMask {
                    target,
                    feedback,
                    update_bind,
                })
            }
            MaskBackend::Cpu => MaskStore::Cpu(CpuMask {
                field: MaskField::new(dims.0, dims.1),
                texture: MaskTexture::new(
                    device,
                    "reveal-mask-upload",
                    dims,
                    CPU_MASK_FORMAT,
                    wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                ),
                staging: Vec::with_capacity(dims.0 as usize * dims.1 as usize),
            }),
        }
    }

    fn refit_layer(&mut self, queue: &wgpu::Queue, slot: ImageSlot) {
        let (sw, sh) = self.surface;
        let threshold = self.threshold;
        let Some(layer) = self.layers[slot.index()].as_mut() else {
            return;
        };
        layer.plane = layout::cover_plane(layer.image_size.0, layer.image_size.1, sw, sh);
        let plane = layer.plane.unwrap_or(PlaneSize {
            width: 0.0,
            height: 0.0,
        });
        let uniforms = LayerUniforms {
            screen_size: [sw as f32, sh as f32],
            plane_size: [plane.width, plane.height],
            threshold,
            use_mask: u32::from(slot == ImageSlot::Reveal),
            _pad: [0.0; 2],
        };
        queue.write_buffer(&layer.uniforms, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Upload a decoded image into its layer, replacing any previous one.
    ///
    /// Images larger than the device's texture limit are downscaled first;
    /// a pixel buffer that does not match its size leaves the layer unchanged.
    pub fn set_image(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &PreparedImage) {
        if self.released || image.width == 0 || image.height == 0 {
            return;
        }
        let expected = image.width as usize * image.height as usize * 4;
        if image.pixels.len() != expected {
            warn!(
                slot = image.slot.as_str(),
                len = image.pixels.len(),
                expected,
                "image buffer does not match its size; layer not updated"
            );
            return;
        }
        let limit = device.limits().max_texture_dimension_2d;
        let shrunk;
        let image = if image.width > limit || image.height > limit {
            let Some(small) = loader::downscale(image, limit) else {
                return;
            };
            warn!(
                slot = image.slot.as_str(),
                from_w = image.width,
                from_h = image.height,
                to_w = small.width,
                to_h = small.height,
                limit,
                "image exceeds the GPU texture limit; downscaled"
            );
            shrunk = small;
            &shrunk
        } else {
            image
        };
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(match image.slot {
                ImageSlot::Base => "reveal-base-image",
                ImageSlot::Reveal => "reveal-reveal-image",
            }),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            texture.as_image_copy(),
            &image.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("reveal-layer-uniforms"),
            size: std::mem::size_of::<LayerUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("reveal-layer-bind"),
            layout: &self.layer_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.image_sampler),
                },
            ],
        });

        let idx = image.slot.index();
        if let Some(old) = self.layers[idx].take() {
            old.destroy();
        }
        self.layers[idx] = Some(Layer {
            texture,
            uniforms,
            bind,
            image_size: (image.width, image.height),
            plane: None,
        });
        self.refit_layer(queue, image.slot);
        info!(
            slot = image.slot.as_str(),
            width = image.width,
            height = image.height,
            "image uploaded"
        );
    }

    /// Record this frame's mask and composite passes into `encoder`.
    ///
    /// Returns `false` when nothing was drawn (released, or no mask yet).
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        inputs: &FrameInputs,
    ) -> bool {
        if self.released {
            return false;
        }
        if inputs.resized || inputs.surface != self.surface {
            self.resize(device, queue, inputs.surface.0, inputs.surface.1);
        }
        let (Some(mask), Some(mask_bind)) = (self.mask.as_mut(), self.mask_bind.as_ref()) else {
            return false;
        };

        match mask {
            MaskStore::Gpu(gpu) => {
                let uniforms = MaskUniforms {
                    pointer: inputs.pointer,
                    aspect: inputs.aspect,
                    active: if inputs.active { 1.0 } else { 0.0 },
                    time: inputs.timing.elapsed,
                    decay: decay_amount(inputs.timing.delta, inputs.duration),
                    radius: inputs.radius,
                    paint_gain: PAINT_GAIN,
                };
                queue.write_buffer(&self.mask_uniforms, 0, bytemuck::bytes_of(&uniforms));
                {
                    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("reveal-mask-pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &gpu.target.view,
                            resolve_target: None,
                            depth_slice: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        occlusion_query_set: None,
                        timestamp_writes: None,
                    });
                    rpass.set_pipeline(&self.mask_pipeline);
                    rpass.set_bind_group(0, &gpu.update_bind, &[]);
                    rpass.draw(0..3, 0..1);
                }
                // Next frame reads the copy, never the target it is writing.
                encoder.copy_texture_to_texture(
                    gpu.target.texture.as_image_copy(),
                    gpu.feedback.texture.as_image_copy(),
                    gpu.target.texture.size(),
                );
            }
            MaskStore::Cpu(cpu) => {
                cpu.field.step(&inputs.step_params());
                cpu.field.write_r8(&mut cpu.staging);
                let (w, h) = (cpu.field.width(), cpu.field.height());
                queue.write_texture(
                    cpu.texture.texture.as_image_copy(),
                    &cpu.staging,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(w),
                        rows_per_image: Some(h),
                    },
                    wgpu::Extent3d {
                        width: w,
                        height: h,
                        depth_or_array_layers: 1,
                    },
                );
            }
        }

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("reveal-composite-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.background),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        rpass.set_pipeline(&self.composite_pipeline);
        rpass.set_bind_group(1, mask_bind, &[]);
        for layer in self.layers.iter().flatten() {
            if layer.plane.is_none() {
                continue;
            }
            rpass.set_bind_group(0, &layer.bind, &[]);
            rpass.draw(0..4, 0..1);
        }
        true
    }

    /// Free every texture and buffer. Later calls, and `render`, become no-ops.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        if let Some(mask) = self.mask.take() {
            mask.destroy();
        }
        self.mask_bind = None;
        self.mask_size = None;
        for layer in self.layers.iter_mut() {
            if let Some(layer) = layer.take() {
                layer.destroy();
            }
        }
        self.mask_uniforms.destroy();
        info!("reveal renderer released");
        true
    }
}

impl Drop for RevealRenderer {
    fn drop(&mut self) {
        self.release();
    }
}
