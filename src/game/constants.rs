//! Gameplay constants. Coordinates are screen-style: x grows right, y grows down.

/// Well geometry
pub mod world {
    /// Inner width of the well (wall to wall)
    pub const WIDTH: f32 = 640.0;
    /// Height of the well
    pub const HEIGHT: f32 = 960.0;
    /// Thickness of every wall
    pub const WALL_PAD: f32 = 64.0;
    /// How far the floor is lifted above the bottom edge of the well
    pub const FLOOR_LIFT: f32 = 48.0;
}

/// Physics constants handed to the rigid-body collaborator
pub mod physics {
    /// Server tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / TICK_RATE as f32;
    /// Tick duration in microseconds
    pub const TICK_DURATION_MICROS: u64 = 1_000_000 / TICK_RATE as u64;
    /// Downward gravity in world units per second squared
    pub const GRAVITY: f32 = 1000.0;
    /// Surface friction for fruit and walls
    pub const FRICTION: f32 = 0.006;
    /// Coefficient of restitution for fruit and walls
    pub const RESTITUTION: f32 = 0.1;
}

/// Game-over rules
pub mod loss {
    /// A settled fruit with y below this value ends the round
    pub const LINE: f32 = 84.0;
    /// |vy| under this counts as settled (0.1 units per 60 Hz step)
    pub const SETTLE_EPSILON: f32 = 6.0;
    /// Consecutive settled samples required before the world resets
    pub const SETTLE_TICKS: u32 = 1;
}

/// Drop rules
pub mod spawn {
    /// Height at which dropped fruit appear, regardless of client input
    pub const PREVIEW_HEIGHT: f32 = 32.0;
}

/// Tier table: (radius, score value) per tier, smallest first
pub mod tiers {
    pub const TABLE: [(f32, u32); 11] = [
        (24.0, 1),
        (32.0, 3),
        (40.0, 6),
        (56.0, 10),
        (64.0, 15),
        (72.0, 21),
        (84.0, 28),
        (96.0, 36),
        (128.0, 45),
        (160.0, 55),
        (192.0, 66),
    ];
}

/// Network constants
pub mod net {
    /// Maximum reliable message size (64 KB)
    pub const MAX_MESSAGE_SIZE: usize = 65536;
    /// Capacity of the inbound command buffer shared by all sessions
    pub const COMMAND_BUFFER_CAPACITY: usize = 4096;
}
