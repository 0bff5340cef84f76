use glam::Vec3;

pub const PITCH_LIMIT: f32 = 89.0;

#[derive(Clone, Copy, Debug, PartialEq)]
enum DragState {
    Idle,
    /// Primary button held. `last` is `None` until the first move event
    /// arrives, which only serves as the reference sample.
    Dragging { last: Option<(f64, f64)> },
}

/// A camera orbiting a fixed pivot. Yaw and pitch are stored in degrees;
/// pitch is kept within ±[`PITCH_LIMIT`], yaw is left to wrap.
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    yaw: f32,
    pitch: f32,
    distance: f32,
    pivot: Vec3,
    eye: Vec3,
    sensitivity: f32,
    drag: DragState,
}

impl OrbitCamera {
    pub fn new(pivot: Vec3, distance: f32, sensitivity: f32) -> OrbitCamera {
        let mut camera = OrbitCamera {
            yaw: 0.0,
            pitch: 0.0,
            distance: distance.max(0.0),
            pivot,
            eye: pivot,
            sensitivity,
            drag: DragState::Idle,
        };
        camera.update_eye();
        camera
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn pivot(&self) -> Vec3 {
        self.pivot
    }

    /// World-space eye position derived from the current yaw/pitch/distance.
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    pub fn set_angles(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_eye();
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance.max(0.0);
        self.update_eye();
    }

    /// Primary button went down.
    pub fn press(&mut self) {
        if !self.is_dragging() {
            self.drag = DragState::Dragging { last: None };
        }
    }

    /// Primary button went up.
    pub fn release(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Pointer moved to `(x, y)` in window coordinates. Only rotates while
    /// dragging, and never on the first sample of a drag.
    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        let DragState::Dragging { last } = &mut self.drag else {
            return;
        };
        let previous = last.replace((x, y));
        if let Some((last_x, last_y)) = previous {
            let yaw_delta = ((x - last_x) * self.sensitivity as f64) as f32;
            // Screen y grows downwards, dragging up pitches up.
            let pitch_delta = ((last_y - y) * self.sensitivity as f64) as f32;
            self.set_angles(self.yaw + yaw_delta, self.pitch + pitch_delta);
        }
    }

    fn update_eye(&mut self) {
        self.eye = orbit_eye(self.pivot, self.yaw, self.pitch, self.distance);
    }
}

/// Spherical to Cartesian around `pivot` with +Y as the polar axis. Angles
/// are in degrees.
pub fn orbit_eye(pivot: Vec3, yaw: f32, pitch: f32, distance: f32) -> Vec3 {
    let (yaw, pitch) = (yaw.to_radians(), pitch.to_radians());
    pivot
        + distance
            * Vec3::new(
                pitch.cos() * yaw.sin(),
                pitch.sin(),
                pitch.cos() * yaw.cos(),
            )
}
