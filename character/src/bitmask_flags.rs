use num_traits::{One, PrimInt};

/// Trait implemented by flag enums declared with [`define_bitmask_flags!`].
///
/// The enum's discriminant (via `#[repr(u8)]`) determines the bit index.
/// The backing integer type is chosen through the associated `Storage`.
pub trait FlagBitmask {
    type Storage: PrimInt;

    fn bit_index(&self) -> u8;

    fn mask(&self) -> Self::Storage {
        // NOTE: `bit_index()` must be < number of bits in `Storage`.
        Self::Storage::one() << (self.bit_index() as usize)
    }
}

/// A plain bitmask container over a primitive integer.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BitmaskFlags<T: PrimInt> {
    pub bits: T,
}

impl<T: PrimInt> BitmaskFlags<T> {
    pub fn new(bits: T) -> Self {
        Self { bits }
    }

    /// Mask with every bit set.
    pub fn all() -> Self {
        Self {
            bits: T::max_value(),
        }
    }

    pub fn empty() -> Self {
        Self { bits: T::zero() }
    }

    /// Build a mask from a list of flags.
    pub fn from_flags<U: FlagBitmask<Storage = T> + Copy>(tags: &[U]) -> Self {
        let mut flags = Self::empty();
        flags.add_many(tags);
        flags
    }

    pub fn is_empty(&self) -> bool {
        self.bits == T::zero()
    }

    // --- Single Flag Operations ---
    pub fn add<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits | tag.mask();
    }

    pub fn remove<U: FlagBitmask<Storage = T>>(&mut self, tag: U) {
        self.bits = self.bits & !tag.mask();
    }

    pub fn has<U: FlagBitmask<Storage = T>>(&self, tag: U) -> bool {
        (self.bits & tag.mask()) != T::zero()
    }

    // --- Bulk Operations ---
    pub fn add_many<U: FlagBitmask<Storage = T> + Copy>(&mut self, tags: &[U]) {
        for &tag in tags {
            self.add(tag);
        }
    }

    pub fn remove_many<U: FlagBitmask<Storage = T> + Copy>(&mut self, tags: &[U]) {
        for &tag in tags {
            self.remove(tag);
        }
    }

    // --- Mask Logic ---
    pub fn has_any<U: FlagBitmask<Storage = T> + Copy>(&self, tags: &[U]) -> bool {
        if tags.is_empty() {
            return false;
        }
        let combined = tags.iter().fold(T::zero(), |acc, t| acc | t.mask());
        (self.bits & combined) != T::zero()
    }

    pub fn intersection(&self, other: Self) -> Self {
        Self {
            bits: self.bits & other.bits,
        }
    }

    pub fn union(&self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    pub fn clear(&mut self) {
        self.bits = T::zero();
    }
}

/// Declare a bitmask-backed enum and implement `FlagBitmask` for it.
///
/// Example:
/// ```text
/// define_bitmask_flags!(SurfaceKind, u16, {
///     Ice,
///     Mud,
///     Metal,
/// });
/// ```
#[macro_export]
macro_rules! define_bitmask_flags {
    ($name:ident, $storage:ty, { $($variant:ident),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant),*
        }

        impl $crate::bitmask_flags::FlagBitmask for $name {
            type Storage = $storage;

            fn bit_index(&self) -> u8 {
                *self as u8
            }
        }
    };
}

define_bitmask_flags!(CollisionFlag, u8, {
    Below,
    Above,
    Left,
    Right,
    Front,
    Back,
});

/// Contact sides touched during a tick.
pub type CollisionFlags = BitmaskFlags<u8>;

define_bitmask_flags!(Layer, u32, {
    Default,
    Environment,
    Character,
    Dynamic,
    Platform,
    Trigger,
    Debris,
});

/// Set of collision layers used to filter scene queries.
pub type LayerMask = BitmaskFlags<u32>;

impl LayerMask {
    /// Layers a character collides with by default (everything but triggers).
    pub fn character_default() -> Self {
        let mut mask = Self::all();
        mask.remove(Layer::Trigger);
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_add_and_remove_individually() {
        let mut flags = CollisionFlags::empty();
        flags.add(CollisionFlag::Below);
        flags.add(CollisionFlag::Front);
        assert!(flags.has(CollisionFlag::Below));
        assert!(flags.has_any(&[CollisionFlag::Left, CollisionFlag::Front]));
        assert!(!flags.has(CollisionFlag::Above));

        flags.remove(CollisionFlag::Front);
        assert!(!flags.has_any(&[CollisionFlag::Left, CollisionFlag::Front]));
        assert_eq!(flags.bits, 1);
    }

    #[test]
    fn default_character_mask_skips_triggers() {
        let mask = LayerMask::character_default();
        assert!(mask.has(Layer::Environment));
        assert!(mask.has(Layer::Character));
        assert!(!mask.has(Layer::Trigger));
    }

    #[test]
    fn intersection_keeps_common_layers() {
        let a = LayerMask::from_flags(&[Layer::Default, Layer::Dynamic]);
        let b = LayerMask::from_flags(&[Layer::Dynamic, Layer::Platform]);
        let both = a.intersection(b);
        assert!(both.has(Layer::Dynamic));
        assert!(!both.has(Layer::Default));
        assert!(!both.has(Layer::Platform));
        assert_eq!(a.union(b).bits.count_ones(), 3);
    }
}
