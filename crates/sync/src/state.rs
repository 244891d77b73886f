use foundation::time::Time;

/// Who is driving the timeline at the moment.
///
/// Each variant remembers enough to recognise the echo of its own action:
/// a band scroll caused by recentering on `center`, or a clock time change
/// caused by pushing `pushed`.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// The clock moved; the band was recentered on `center`.
    ExternallyDriven { center: Time },
    /// The band was dragged; the clock was set to `pushed`.
    SelfDriven { pushed: Time },
    /// Held while the zoom matcher steps the band.
    ZoomAdjusting,
}

/// Times closer than this are the same instant.
pub const ECHO_EPSILON_MS: f64 = 1.0;

pub(crate) fn same_instant(a: Time, b: Time) -> bool {
    (a.0 - b.0).abs() <= ECHO_EPSILON_MS
}

impl PlaybackState {
    /// A band scroll landing on the center we set ourselves.
    pub fn is_scroll_echo(&self, band_center: Time) -> bool {
        match *self {
            PlaybackState::ExternallyDriven { center } => same_instant(center, band_center),
            PlaybackState::ZoomAdjusting => true,
            _ => false,
        }
    }

    /// A clock change reporting the time we pushed ourselves.
    pub fn is_time_echo(&self, time: Time) -> bool {
        matches!(*self, PlaybackState::SelfDriven { pushed } if same_instant(pushed, time))
    }
}

#[cfg(test)]
mod tests {
    use super::PlaybackState;
    use foundation::time::Time;

    #[test]
    fn echoes_match_only_their_own_driver() {
        let ext = PlaybackState::ExternallyDriven { center: Time(1_000.0) };
        assert!(ext.is_scroll_echo(Time(1_000.4)));
        assert!(!ext.is_scroll_echo(Time(5_000.0)));
        assert!(!ext.is_time_echo(Time(1_000.0)));

        let own = PlaybackState::SelfDriven { pushed: Time(7.0) };
        assert!(own.is_time_echo(Time(7.0)));
        assert!(!own.is_scroll_echo(Time(7.0)));
        assert!(!PlaybackState::Idle.is_time_echo(Time(7.0)));
    }
}
