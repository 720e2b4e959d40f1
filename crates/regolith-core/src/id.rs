use slotmap::new_key_type;

new_key_type! {
    /// Identifies a placed structure in the registry arena.
    pub struct StructureId;

    /// Identifies a robot in the roster arena.
    pub struct RobotId;
}
