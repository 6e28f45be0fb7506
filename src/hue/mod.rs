//! # Hue Parameter Module
//!
//! Turns the textual hue/saturation options into fixed-point rotation
//! coefficients, once per frame.
//!
//! Two option forms are accepted:
//!
//! - `hue[:saturation]` with literal values (hue in degrees), constant for the
//!   whole stream
//! - `h=<expr>`, `H=<expr>` and `s=<expr>` joined by `:`, re-evaluated for every
//!   frame over the variables `n`, `pts`, `r`, `t` and `tb`
//!
//! ```rust
//! use yuv_hue::hue::{ParameterResolver, VariableContext};
//! use yuv_hue::video::Rational;
//!
//! let mut resolver = ParameterResolver::from_options("h=90*t:s=1.5").unwrap();
//! let mut vars = VariableContext::new(Rational::new(1, 25), Rational::new(25, 1));
//! vars.set_timestamp(Some(25));
//!
//! let coeffs = resolver.resolve_for_frame(&mut vars);
//! assert_eq!(coeffs.sin_scaled, 98304);
//! ```

pub mod options;
pub mod params;
pub mod vars;

pub use options::{HueExprText, HueOptions, SAT_MAX_VAL, SAT_MIN_VAL};
pub use params::{
    HueParameters, HueSource, ParameterResolver, ParameterSource, PendingUpdate, ResolverState,
    RotationCoefficients,
};
pub use vars::{Var, VariableContext, VAR_NAMES};
