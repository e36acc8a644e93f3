//! Kalman predictor for short-horizon fingertip extrapolation
//!
//! State vector: [x, y, vx, vy]ᵀ (4 elements, velocity in units/second).
//! Uncertainty is kept diagonal: one variance per state element, so the
//! gain is a plain ratio of predicted variance to total variance.

use nalgebra::SVector;

/// 4-element state / diagonal covariance type
type Vector4 = SVector<f32, 4>;

/// Kalman filter for fingertip position and velocity
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    /// State: [x, y, vx, vy]
    state: Vector4,

    /// Diagonal of the state covariance
    variance: Vector4,

    /// Process noise per second: [pos, pos, vel, vel]
    process_noise: Vector4,

    /// Measurement noise (position only)
    measurement_noise: f32,

    initialized: bool,
}

impl KalmanFilter {
    pub fn new(process_noise_pos: f32, process_noise_vel: f32, measurement_noise: f32) -> Self {
        Self {
            state: Vector4::zeros(),
            variance: Vector4::repeat(1.0),
            process_noise: Vector4::new(
                process_noise_pos,
                process_noise_pos,
                process_noise_vel,
                process_noise_vel,
            ),
            measurement_noise,
            initialized: false,
        }
    }

    /// Initialize filter with first measurement
    pub fn initialize(&mut self, x: f32, y: f32) {
        self.state = Vector4::new(x, y, 0.0, 0.0);
        self.variance = Vector4::new(
            self.measurement_noise,
            self.measurement_noise,
            1.0,
            1.0,
        );
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Predict step: x += v*dt, variance grows with dt
    pub fn predict(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.state[0] += self.state[2] * dt;
        self.state[1] += self.state[3] * dt;

        // P = F P Fᵀ + Q, keeping only the diagonal
        self.variance[0] += self.variance[2] * dt * dt + self.process_noise[0] * dt;
        self.variance[1] += self.variance[3] * dt * dt + self.process_noise[1] * dt;
        self.variance[2] += self.process_noise[2] * dt;
        self.variance[3] += self.process_noise[3] * dt;
    }

    /// Correct step with a position measurement taken `dt` after the last one
    pub fn correct(&mut self, measured_x: f32, measured_y: f32, dt: f32) {
        if !self.initialized {
            self.initialize(measured_x, measured_y);
            return;
        }

        let innovation = (measured_x - self.state[0], measured_y - self.state[1]);
        let r = self.measurement_noise;

        // Position gain: predicted / (predicted + measurement)
        let kx = self.variance[0] / (self.variance[0] + r);
        let ky = self.variance[1] / (self.variance[1] + r);
        self.state[0] += kx * innovation.0;
        self.state[1] += ky * innovation.1;
        self.variance[0] *= 1.0 - kx;
        self.variance[1] *= 1.0 - ky;

        // Velocity sees the innovation as a rate error over dt
        if dt > 0.0 {
            let r_vel = r / (dt * dt);
            let kvx = self.variance[2] / (self.variance[2] + r_vel);
            let kvy = self.variance[3] / (self.variance[3] + r_vel);
            self.state[2] += kvx * innovation.0 / dt;
            self.state[3] += kvy * innovation.1 / dt;
            self.variance[2] *= 1.0 - kvx;
            self.variance[3] *= 1.0 - kvy;
        }
    }

    /// Predict-then-correct in one call
    pub fn step(&mut self, measured_x: f32, measured_y: f32, dt: f32) {
        if self.initialized {
            self.predict(dt);
        }
        self.correct(measured_x, measured_y, dt);
    }

    /// Estimated position
    pub fn position(&self) -> (f32, f32) {
        (self.state[0], self.state[1])
    }

    /// Estimated velocity (units per second)
    pub fn velocity(&self) -> (f32, f32) {
        (self.state[2], self.state[3])
    }

    pub fn reset(&mut self) {
        self.state = Vector4::zeros();
        self.variance = Vector4::repeat(1.0);
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> KalmanFilter {
        KalmanFilter::new(1e-4, 5e-2, 1e-3)
    }

    #[test]
    fn first_measurement_initializes() {
        let mut kf = filter();
        kf.step(0.3, 0.4, 0.033);
        assert_eq!(kf.position(), (0.3, 0.4));
        assert_eq!(kf.velocity(), (0.0, 0.0));
    }

    #[test]
    fn learns_constant_velocity() {
        let mut kf = filter();
        let dt = 0.033;
        for i in 0..60 {
            let x = 0.1 + 0.5 * dt * i as f32;
            kf.step(x, 0.5, dt);
        }
        let (vx, vy) = kf.velocity();
        assert!((vx - 0.5).abs() < 0.1, "vx = {vx}");
        assert!(vy.abs() < 0.05);
    }

    #[test]
    fn stationary_input_has_no_velocity() {
        let mut kf = filter();
        for _ in 0..30 {
            kf.step(0.5, 0.5, 0.033);
        }
        let (vx, vy) = kf.velocity();
        assert!(vx.abs() < 1e-4 && vy.abs() < 1e-4);
    }
}
