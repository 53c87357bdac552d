//! Live cluster stories
//!
//! - `up_down`: Stories about deploying a converted application and
//!   removing it again with the same inputs

mod up_down;
