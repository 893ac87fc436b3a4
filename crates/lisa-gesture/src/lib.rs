//! LISA Gesture - Hand landmarks in, discrete gesture symbols out
//!
//! Pipeline per video frame:
//!
//! landmarks (first hand) → classify → symbol → EmissionGate → emitted symbol
//!
//! The classifier is a pure single-frame heuristic. All temporal state
//! lives in the gate, one gate per session.

pub mod classifier;
pub mod gate;
pub mod landmark;

pub use classifier::*;
pub use gate::*;
pub use landmark::*;
