use nalgebra as na;

/// Seconds-per-minute over radians-per-revolution, for rad/s to RPM conversion.
const RAD_PER_S_TO_RPM: f64 = 60.0 / (2.0 * core::f64::consts::PI);

/// A DC bus fed by a motor acting as a generator.
///
/// The bus is a capacitor drained by a constant load current. Braking current `u` on the motor
/// produces a torque `kt·u` against the rotor and pushes the power `η·kt·ω·u` into the bus.
pub struct BusPlant {
    /// Bus capacitance (F).
    pub capacitance: f64,
    /// Constant current drawn from the bus (A).
    pub load_current: f64,
    /// Motor torque constant (N·m/A).
    pub torque_constant: f64,
    /// Rotor inertia (kg·m²).
    pub inertia: f64,
    /// Fraction of the mechanical power that reaches the bus.
    pub efficiency: f64,
    /// Torque driving the rotor, e.g. from a prop in windmilling flight (N·m).
    pub drive_torque: f64,
    /// Viscous friction (N·m·s/rad).
    pub friction: f64,
    /// Pole pairs, to report electrical RPM.
    pub pole_pairs: f64,
}

impl BusPlant {
    /// Implements the dynamics of the state x = [v, ω] under braking current u:
    ///
    /// v' = (η·kt·ω·u / v − I_load) / C
    /// ω' = (τ_drive − kt·u − b·ω) / J
    pub fn f(&self, x: na::Vector2<f64>, u: f64) -> na::Vector2<f64> {
        let (voltage, omega) = (x[0], x[1]);
        let regen_power = self.efficiency * self.torque_constant * omega * u;
        let bus_in = if voltage > 0.0 {
            regen_power / voltage
        } else {
            0.0
        };

        na::Vector2::new(
            (bus_in - self.load_current) / self.capacitance,
            (self.drive_torque - self.torque_constant * u - self.friction * omega) / self.inertia,
        )
    }

    /// Bus voltage.
    pub fn h(&self, x: na::Vector2<f64>) -> f64 {
        x[0]
    }

    /// Signed electrical RPM.
    pub fn erpm(&self, x: na::Vector2<f64>) -> f64 {
        x[1] * RAD_PER_S_TO_RPM * self.pole_pairs
    }

    /// Converts electrical RPM back to rotor speed in rad/s.
    pub fn omega_from_erpm(&self, erpm: f64) -> f64 {
        erpm / (RAD_PER_S_TO_RPM * self.pole_pairs)
    }
}
