#![allow(clippy::needless_range_loop, clippy::manual_range_contains, clippy::nonminimal_bool,
         clippy::neg_cmp_op_on_partial_ord)]
// Static light clustering for the Vulkan renderer

pub mod vk_local;
pub mod vk_model_types;
pub mod vk_model;
pub mod vk_textures;
pub mod vk_pvs;
pub mod vk_rad;
pub mod vk_entities;
pub mod vk_light;
pub mod vk_bsp_dump;
pub mod platform;
