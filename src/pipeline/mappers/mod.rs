pub mod business;
pub mod passthrough;

pub use business::BusinessMapper;
pub use passthrough::PassthroughMapper;

use crate::app::ports::RecordMapper;
use crate::config::{MapperConfig, MapperKind};

/// Build the mapper selected in configuration
pub fn build_mapper(config: &MapperConfig) -> Box<dyn RecordMapper> {
    match config.kind {
        MapperKind::Business => Box::new(BusinessMapper::new(
            config.user_dataset.clone(),
            config.company_dataset.clone(),
        )),
        MapperKind::Passthrough => Box::new(PassthroughMapper::new(config.dataset.clone())),
    }
}
