use crate::device::{GraphicsDevice, TextureId};

#[derive(Debug, Copy, Clone, Default)]
struct TextureUnit {
    texture: Option<TextureId>,
    last_touch: u64,
}

/// Fixed table of hardware texture units with least-recently-used eviction.
///
/// Timestamps come from a logical clock advanced on every touch, so two
/// touches never share a stamp. A texture is resident in at most one unit.
#[derive(Debug)]
pub struct TextureUnitCache {
    units: Vec<TextureUnit>,
    clock: u64,
}

impl TextureUnitCache {
    /// # Panics
    /// Panics if `unit_count` is zero.
    pub fn new(unit_count: u32) -> Self {
        assert!(unit_count > 0, "device exposes no texture units");
        Self {
            units: vec![TextureUnit::default(); unit_count as usize],
            clock: 0,
        }
    }

    #[inline]
    pub fn unit_count(&self) -> u32 {
        self.units.len() as u32
    }

    /// Unit currently holding `texture`, if any.
    pub fn unit_of(&self, texture: TextureId) -> Option<u32> {
        self.units
            .iter()
            .position(|u| u.texture == Some(texture))
            .map(|i| i as u32)
    }

    /// Texture bound to `unit`.
    ///
    /// # Panics
    /// Panics if `unit` is outside the table.
    pub fn bound(&self, unit: u32) -> Option<TextureId> {
        self.units[unit as usize].texture
    }

    /// Makes `texture` resident and returns its unit.
    ///
    /// A resident texture only has its stamp refreshed. Otherwise the first
    /// empty unit is taken; with none empty, the oldest-stamped unit is evicted.
    /// Only the latter two paths reach the device.
    pub fn bind<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, texture: TextureId) -> u32 {
        self.clock += 1;

        if let Some(unit) = self.unit_of(texture) {
            self.units[unit as usize].last_touch = self.clock;
            return unit;
        }

        let victim = self
            .units
            .iter()
            .position(|u| u.texture.is_none())
            .or_else(|| {
                self.units
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, u)| u.last_touch)
                    .map(|(i, _)| i)
            })
            .unwrap_or(0);

        if let Some(evicted) = self.units[victim].texture {
            log::trace!("texture unit {victim}: evicting {evicted:?} for {texture:?}");
        }

        self.units[victim] = TextureUnit {
            texture: Some(texture),
            last_touch: self.clock,
        };
        device.bind_texture(victim as u32, Some(texture));
        victim as u32
    }

    /// Unbinds `texture` if resident, leaving its unit empty.
    pub fn release<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        texture: TextureId,
    ) -> Option<u32> {
        let unit = self.unit_of(texture)?;
        self.units[unit as usize] = TextureUnit::default();
        device.bind_texture(unit, None);
        Some(unit)
    }

    /// Empties the table without device calls (context loss).
    pub fn forget(&mut self) {
        self.units.fill(TextureUnit::default());
    }
}
