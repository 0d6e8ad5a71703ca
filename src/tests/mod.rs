//! # Controller Scenario Tests
//!
//! End-to-end runs of the screen controller against scripted buttons, fake
//! metric sources, a recording display and a recording power-off agent, all
//! driven by a fake clock so multi-second scenarios finish instantly.

mod fakes;
