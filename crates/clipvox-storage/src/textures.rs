use glam::UVec3;

use crate::device::{TextureDesc, VoxelDevice};
use crate::planner::CascadePlan;

/// Everything the three textures depend on. Textures are rebuilt only when this changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSpec<F> {
    pub cascade_resolution: UVec3,
    pub cascade_count: u32,
    pub mip_count: u32,
    pub format: F,
    /// Attribute channels packed side by side along X.
    pub layout_size: u32,
}

impl<F: Copy> ResourceSpec<F> {
    pub fn new(plan: &CascadePlan, format: F, layout_size: u32) -> Self {
        Self {
            cascade_resolution: plan.cascade_resolution,
            cascade_count: plan.cascade_count,
            mip_count: plan.mip_count,
            format,
            layout_size,
        }
    }

    /// Cascades stacked along Y, channels side by side along X.
    pub fn cascade_texture_size(&self) -> UVec3 {
        let res = self.cascade_resolution;
        UVec3::new(
            res.x * self.layout_size,
            res.y * self.cascade_count,
            res.z,
        )
    }

    /// Top level of the mip chain: half the cascade resolution.
    pub fn mip_chain_size(&self) -> UVec3 {
        let half = (self.cascade_resolution / 2).max(UVec3::ONE);
        UVec3::new(half.x * self.layout_size, half.y, half.z)
    }

    /// Size of mip chain level `level`, never below one texel.
    pub fn mip_level_size(&self, level: u32) -> UVec3 {
        (self.mip_chain_size() / (1u32 << level.min(31))).max(UVec3::ONE)
    }

    fn is_empty(&self) -> bool {
        self.layout_size == 0 || self.cascade_texture_size().min_element() == 0
    }
}

/// The textures compaction writes and lighting samples.
#[derive(Debug)]
pub struct CascadeTextures<T> {
    /// Every cascade stacked into one 3D texture.
    pub cascades: T,
    /// Box-filtered levels below the coarsest cascade; `None` when there are no mips.
    pub mip_chain: Option<T>,
    /// One bounce texture per mip level, each the size of the mip chain's top level.
    pub scratch: Vec<T>,
    pub layout_size: u32,
}

/// Lazily (re)creates [`CascadeTextures`] whenever the [`ResourceSpec`] changes.
pub struct TextureManager<T, F> {
    spec: Option<ResourceSpec<F>>,
    textures: Option<CascadeTextures<T>>,
    /// Texture sets created so far, for diagnostics.
    recreations: u64,
}

impl<T, F> Default for TextureManager<T, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, F> TextureManager<T, F> {
    pub fn new() -> Self {
        Self {
            spec: None,
            textures: None,
            recreations: 0,
        }
    }

    pub fn textures(&self) -> Option<&CascadeTextures<T>> {
        self.textures.as_ref()
    }

    pub fn spec(&self) -> Option<&ResourceSpec<F>> {
        self.spec.as_ref()
    }

    pub fn recreations(&self) -> u64 {
        self.recreations
    }
}

impl<T, F: Copy + PartialEq + std::fmt::Debug> TextureManager<T, F> {
    /// Make sure the textures match `plan`, `format` and `layout_size`.
    ///
    /// All three textures are destroyed and recreated together; a degenerate spec
    /// leaves no textures.
    pub fn update<D>(
        &mut self,
        device: &mut D,
        plan: &CascadePlan,
        format: F,
        layout_size: u32,
    ) -> Option<&CascadeTextures<T>>
    where
        D: VoxelDevice<Texture = T, Format = F>,
    {
        let spec = ResourceSpec::new(plan, format, layout_size);
        if self.spec == Some(spec) {
            return self.textures.as_ref();
        }

        self.release(device);
        self.spec = Some(spec);

        if spec.is_empty() {
            log::debug!("TextureManager: empty resource spec, no textures allocated");
            return None;
        }

        log::info!(
            "TextureManager: cascade texture {:?}, {} mips, format {:?}",
            spec.cascade_texture_size(),
            spec.mip_count,
            spec.format
        );

        let cascades = device.create_texture(&TextureDesc {
            label: "clipmap-cascades",
            size: spec.cascade_texture_size(),
            mip_level_count: 1,
            format,
        });

        let mut mip_chain = None;
        let mut scratch = Vec::with_capacity(spec.mip_count as usize);
        if spec.mip_count > 0 {
            mip_chain = Some(device.create_texture(&TextureDesc {
                label: "clipmap-mip-chain",
                size: spec.mip_chain_size(),
                mip_level_count: spec.mip_count,
                format,
            }));
            for _ in 0..spec.mip_count {
                scratch.push(device.create_texture(&TextureDesc {
                    label: "clipmap-mip-scratch",
                    size: spec.mip_chain_size(),
                    mip_level_count: 1,
                    format,
                }));
            }
        }

        self.recreations += 1;
        self.textures = Some(CascadeTextures {
            cascades,
            mip_chain,
            scratch,
            layout_size,
        });
        self.textures.as_ref()
    }

    /// Destroy every texture. The next `update` recreates them.
    pub fn release<D>(&mut self, device: &mut D)
    where
        D: VoxelDevice<Texture = T, Format = F>,
    {
        self.spec = None;
        if let Some(old) = self.textures.take() {
            device.destroy_texture(old.cascades);
            if let Some(mip_chain) = old.mip_chain {
                device.destroy_texture(mip_chain);
            }
            for texture in old.scratch {
                device.destroy_texture(texture);
            }
        }
    }
}
