pub mod dispatch_worker;
pub mod reconciler;
