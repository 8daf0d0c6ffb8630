//! Input ports: the resource used to drive the coordination core

pub mod facade;
pub mod model;

pub use facade::PortFacade;
pub use model::{Port, PortDto, PortEntity, PortState};
