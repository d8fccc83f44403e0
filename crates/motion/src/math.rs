//! Float helpers that resolve to intrinsics on `std` and to `libm` on bare
//! metal.

#[inline]
pub(crate) fn sqrtf(x: f32) -> f32 {
    #[cfg(feature = "std")]
    {
        x.sqrt()
    }
    #[cfg(not(feature = "std"))]
    {
        libm::sqrtf(x)
    }
}

#[inline]
pub(crate) fn fabsf(x: f32) -> f32 {
    #[cfg(feature = "std")]
    {
        x.abs()
    }
    #[cfg(not(feature = "std"))]
    {
        libm::fabsf(x)
    }
}

/// Round half away from zero. Step conversion has used this rule since the
/// first firmware revision; `as`-truncation alone would bias toward zero.
#[inline]
pub(crate) fn round_to_steps(x: f32) -> i32 {
    if x >= 0.0 {
        (x + 0.5) as i32
    } else {
        (x - 0.5) as i32
    }
}
