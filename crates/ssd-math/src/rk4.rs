//! Explicit steppers for first-order position ODEs `dx/dt = v(x)`.
//!
//! The velocity callback is fallible so that a stage evaluated outside the
//! field domain aborts the step instead of extrapolating.

/// 3-vector `a + s * b`.
#[inline(always)]
pub fn axpy(a: [f64; 3], s: f64, b: [f64; 3]) -> [f64; 3] {
    [a[0] + s * b[0], a[1] + s * b[1], a[2] + s * b[2]]
}

#[inline(always)]
pub fn norm(a: [f64; 3]) -> f64 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

#[inline(always)]
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline(always)]
pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// One forward-Euler step.
pub fn euler_step<E, F>(x: [f64; 3], dt: f64, mut velocity: F) -> Result<[f64; 3], E>
where
    F: FnMut([f64; 3]) -> Result<[f64; 3], E>,
{
    Ok(axpy(x, dt, velocity(x)?))
}

/// One classical RK4 step.
pub fn rk4_step<E, F>(x: [f64; 3], dt: f64, mut velocity: F) -> Result<[f64; 3], E>
where
    F: FnMut([f64; 3]) -> Result<[f64; 3], E>,
{
    let k1 = velocity(x)?;
    let k2 = velocity(axpy(x, 0.5 * dt, k1))?;
    let k3 = velocity(axpy(x, 0.5 * dt, k2))?;
    let k4 = velocity(axpy(x, dt, k3))?;
    Ok([
        x[0] + dt * (k1[0] + 2.0 * k2[0] + 2.0 * k3[0] + k4[0]) / 6.0,
        x[1] + dt * (k1[1] + 2.0 * k2[1] + 2.0 * k3[1] + k4[1]) / 6.0,
        x[2] + dt * (k1[2] + 2.0 * k2[2] + 2.0 * k3[2] + k4[2]) / 6.0,
    ])
}
