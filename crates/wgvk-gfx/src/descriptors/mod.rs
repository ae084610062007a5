pub mod bind_group;
pub mod bind_group_layout;
