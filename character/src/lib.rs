pub mod bitmask_flags;
pub mod config;
pub mod constants;
pub mod controller;
pub mod math;
pub mod scene;
pub mod world;

pub use bitmask_flags::{CollisionFlag, CollisionFlags, Layer, LayerMask};
pub use config::{CharacterConfig, PlatformInheritance};
pub use controller::{
    CharacterController, CharacterLookup, CharacterSnapshot, CharacterState, ForceMode,
    MoveInput, NeoCharacter, NoCharacters, ResizeState, VariableGravity,
};
pub use scene::{
    BodyId, BodyKind, CharacterHit, CharacterId, ColliderDef, ColliderId, CollisionScene,
    CollisionWorld, MovingPlatform, QueryFilter, SceneError,
};
pub use world::CharacterWorld;
