//! Per-frame input values fed into the camera

/// Movement keys held during the current frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySet {
    pub forward: bool,
    pub backward: bool,
    pub strafe_left: bool,
    pub strafe_right: bool,
    pub descend: bool,
}

/// One poll of the input devices: held keys plus mouse motion since the last poll
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    pub keys: KeySet,
    pub mouse_dx: f32,
    pub mouse_dy: f32,
}

impl InputSnapshot {
    /// No keys held, no motion
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: KeySet) -> Self {
        Self {
            keys,
            ..Self::default()
        }
    }

    pub fn with_mouse(dx: f32, dy: f32) -> Self {
        Self {
            keys: KeySet::default(),
            mouse_dx: dx,
            mouse_dy: dy,
        }
    }
}
