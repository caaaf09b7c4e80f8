pub mod capture_loop;
pub mod frame_scheduler;
pub mod session_controller;
pub mod session_error;
pub mod session_logger;
pub mod session_state;

#[cfg(test)]
pub(crate) mod test_support;
