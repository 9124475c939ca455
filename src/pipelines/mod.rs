pub mod fill_mask_pipeline;
pub mod pos_tagging_pipeline;
pub mod utils;

pub use utils::DeviceSelectable;
