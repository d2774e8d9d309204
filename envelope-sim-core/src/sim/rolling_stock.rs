use crate::imports::*;
use crate::utils::is_strictly_increasing;

/// How the braking deceleration `gamma` of a rolling stock applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GammaType {
    /// The train decelerates at exactly `gamma`, whatever the grade and resistance
    Const,
    /// `gamma` gives the maximum braking force, which adds up to resistance and weight
    Max,
}

/// A point of the tractive effort curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TractiveEffortPoint {
    /// m/s
    pub speed: f64,
    /// Maximum tractive force at this speed, N
    pub max_effort: f64,
}

impl ObjState for TractiveEffortPoint {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        chk_num_gez_fin(&mut errors, self.speed, "Speed");
        chk_num_gez_fin(&mut errors, self.max_effort, "Max effort");
        errors.make_err()
    }
}

/// Physical characteristics of a train, as seen by the integrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingStock {
    #[serde(default)]
    pub name: String,
    /// m
    pub length: f64,
    /// kg
    pub mass: f64,
    /// Multiplies the mass to account for rotating parts
    pub inertia_coefficient: f64,
    /// Davis coefficient A, N
    pub a: f64,
    /// Davis coefficient B, N/(m/s)
    pub b: f64,
    /// Davis coefficient C, N/(m/s)²
    pub c: f64,
    /// m/s
    pub max_speed: f64,
    /// Maximum acceleration from traction, m/s²
    pub comfort_acceleration: f64,
    /// Braking deceleration, m/s²
    pub gamma: f64,
    pub gamma_type: GammaType,
    /// Sorted by increasing speed
    pub tractive_effort_curve: Vec<TractiveEffortPoint>,
}

impl SerdeAPI for RollingStock {
    fn init(&mut self) -> anyhow::Result<()> {
        init_validated(self)
    }
}

impl ObjState for RollingStock {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        chk_num_gtz_fin(&mut errors, self.length, "Length");
        chk_num_gtz_fin(&mut errors, self.mass, "Mass");
        chk_num_gtz_fin(&mut errors, self.inertia_coefficient, "Inertia coefficient");
        chk_num_gez_fin(&mut errors, self.a, "Davis A");
        chk_num_gez_fin(&mut errors, self.b, "Davis B");
        chk_num_gez_fin(&mut errors, self.c, "Davis C");
        chk_num_gtz_fin(&mut errors, self.max_speed, "Max speed");
        chk_num_gtz_fin(&mut errors, self.comfort_acceleration, "Comfort acceleration");
        chk_num_gtz_fin(&mut errors, self.gamma, "Gamma");
        validate_slice(&mut errors, &self.tractive_effort_curve, "Tractive effort point");
        early_err!(errors, "Rolling stock");
        if self.tractive_effort_curve.is_empty() {
            errors.push(anyhow!("Tractive effort curve must not be empty"));
        }
        let speeds: Vec<f64> = self.tractive_effort_curve.iter().map(|p| p.speed).collect();
        if !is_strictly_increasing(&speeds) {
            errors.push(anyhow!(
                "Tractive effort curve speeds must be strictly increasing"
            ));
        }
        errors.make_err()
    }
}

impl RollingStock {
    /// Mass including rotating inertia, kg
    pub fn inertia(&self) -> f64 {
        self.mass * self.inertia_coefficient
    }

    /// Davis resistance to motion at `speed`, N, always positive
    pub fn rolling_resistance(&self, speed: f64) -> f64 {
        let speed = speed.abs();
        self.a + self.b * speed + self.c * speed * speed
    }

    /// Derivative of the rolling resistance over speed, N/(m/s)
    pub fn rolling_resistance_deriv(&self, speed: f64) -> f64 {
        self.b + 2. * self.c * speed.abs()
    }

    /// Maximum tractive force at `speed`, N. Linear between curve points,
    /// constant beyond both ends of the curve.
    pub fn max_tractive_effort(&self, speed: f64) -> f64 {
        let curve = &self.tractive_effort_curve;
        let speed = speed.abs();
        let upper = curve.partition_point(|point| point.speed <= speed);
        if upper == 0 {
            return curve.first().map_or(0., |p| p.max_effort);
        }
        if upper == curve.len() {
            return curve.last().map_or(0., |p| p.max_effort);
        }
        let (left, right) = (curve[upper - 1], curve[upper]);
        left.max_effort
            + (right.max_effort - left.max_effort) * (speed - left.speed) / (right.speed - left.speed)
    }

    /// Maximum braking force, N. Only meaningful for [`GammaType::Max`].
    pub fn max_braking_force(&self) -> f64 {
        self.gamma * self.inertia()
    }

    /// Deceleration of a braking train when it does not depend on forces, m/s²
    pub fn deceleration(&self) -> f64 {
        -self.gamma
    }

    /// A simple fast passenger train, used across tests
    pub fn mock() -> Self {
        Self {
            name: "mock".into(),
            length: 400.,
            mass: 900_000.,
            inertia_coefficient: 1.05,
            a: (0.65 * 900_000.) / 100.,
            b: ((0.01 * 900_000.) / 100.) * 3.6,
            c: ((0.00015 * 900_000.) / 100.) * 3.6 * 3.6,
            max_speed: 300. / 3.6,
            comfort_acceleration: 0.25,
            gamma: 0.5,
            gamma_type: GammaType::Const,
            tractive_effort_curve: [
                (0., 441_666.),
                (5., 439_473.),
                (10., 435_714.),
                (15., 427_080.),
                (20., 410_473.),
                (22., 397_014.),
                (27., 363_687.),
                (32., 333_140.),
                (37., 306_296.),
                (42., 281_285.),
                (47., 258_560.),
                (52., 237_493.),
                (57., 218_178.),
                (62., 200_525.),
                (67., 184_381.),
                (72., 169_605.),
                (77., 156_060.),
                (82., 143_635.),
                (87., 132_205.),
            ]
            .iter()
            .map(|(speed, max_effort)| TractiveEffortPoint {
                speed: *speed,
                max_effort: *max_effort,
            })
            .collect(),
        }
    }
}
