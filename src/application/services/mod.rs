pub mod clock;
pub mod gateway;
pub mod queue;
pub mod renderer;
pub mod throttle;
