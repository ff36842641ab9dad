use std::sync::{Arc, Mutex};

use hausbus_domain::binary::BinaryState;
use hausbus_domain::command::Command;
use hausbus_domain::error::HausbusError;
use hausbus_domain::id::ComponentId;
use hausbus_domain::settings::MotionDetectorSettings;
use hausbus_domain::state::{ComponentStatus, MotionDetectionState};

use crate::binary_io::{BinaryInput, BinaryStateChange};
use crate::component::{
    Commandable, Component, StatusListener, Stateful, publish_status, unsupported,
};
use crate::settings::Settings;
use crate::subscription::{Listeners, Subscription};
use crate::sync::lock;
use crate::trigger::Trigger;

struct DetectorInner {
    id: ComponentId,
    settings: Settings<MotionDetectorSettings>,
    /// Last level seen on the input, tracked even while disabled.
    sensed: Mutex<MotionDetectionState>,
    motion_detected: Trigger,
    detection_completed: Trigger,
    listeners: Listeners<StatusListener>,
}

impl DetectorInner {
    fn status_for(enabled: bool, sensed: MotionDetectionState) -> ComponentStatus {
        if enabled {
            ComponentStatus::new().with(sensed)
        } else {
            ComponentStatus::new().with(MotionDetectionState::Disabled)
        }
    }

    fn process(&self, level: BinaryState) {
        // Active-low: the sensor pulls the line down while it sees motion.
        let sensed = match level {
            BinaryState::Low => MotionDetectionState::MotionDetected,
            BinaryState::High => MotionDetectionState::Idle,
        };
        let old = std::mem::replace(&mut *lock(&self.sensed), sensed);
        if old == sensed || !self.settings.get().is_enabled {
            return;
        }

        publish_status(
            &self.listeners,
            &Self::status_for(true, old),
            &Self::status_for(true, sensed),
        );
        if sensed == MotionDetectionState::MotionDetected {
            tracing::debug!(component = %self.id, "motion detected");
            self.motion_detected.execute();
        } else {
            self.detection_completed.execute();
        }
    }
}

/// Motion sensor on an active-low binary input.
pub struct MotionDetector {
    inner: Arc<DetectorInner>,
    _subscriptions: Subscription,
}

impl MotionDetector {
    pub fn new(
        id: ComponentId,
        input: &dyn BinaryInput,
        settings: Settings<MotionDetectorSettings>,
    ) -> Self {
        let sensed = match input.read() {
            BinaryState::Low => MotionDetectionState::MotionDetected,
            BinaryState::High => MotionDetectionState::Idle,
        };
        let inner = Arc::new(DetectorInner {
            motion_detected: Trigger::new(format!("{id}:motion_detected")),
            detection_completed: Trigger::new(format!("{id}:detection_completed")),
            id,
            settings,
            sensed: Mutex::new(sensed),
            listeners: Listeners::new(),
        });

        let weak = Arc::downgrade(&inner);
        let on_input = input.on_state_changed(Arc::new(move |change: BinaryStateChange| {
            if let Some(inner) = weak.upgrade() {
                inner.process(change.new);
            }
        }));

        let weak = Arc::downgrade(&inner);
        let on_settings = inner.settings.on_changed(move |old, new| {
            if old.is_enabled == new.is_enabled {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                let sensed = *lock(&inner.sensed);
                tracing::info!(component = %inner.id, enabled = new.is_enabled, "motion detector toggled");
                publish_status(
                    &inner.listeners,
                    &DetectorInner::status_for(old.is_enabled, sensed),
                    &DetectorInner::status_for(new.is_enabled, sensed),
                );
            }
        });

        Self {
            inner,
            _subscriptions: Subscription::combine(vec![on_input, on_settings]),
        }
    }

    #[must_use]
    pub fn motion_detected_trigger(&self) -> &Trigger {
        &self.inner.motion_detected
    }

    #[must_use]
    pub fn detection_completed_trigger(&self) -> &Trigger {
        &self.inner.detection_completed
    }

    #[must_use]
    pub fn settings(&self) -> &Settings<MotionDetectorSettings> {
        &self.inner.settings
    }

    #[must_use]
    pub fn state(&self) -> MotionDetectionState {
        if self.inner.settings.get().is_enabled {
            *lock(&self.inner.sensed)
        } else {
            MotionDetectionState::Disabled
        }
    }
}

impl Component for MotionDetector {
    fn id(&self) -> &ComponentId {
        &self.inner.id
    }

    fn kind(&self) -> &'static str {
        "motion_detector"
    }
}

impl Stateful for MotionDetector {
    fn status(&self) -> ComponentStatus {
        ComponentStatus::new().with(self.state())
    }

    fn on_status_changed(&self, listener: Arc<StatusListener>) -> Subscription {
        self.inner.listeners.add(listener)
    }
}

impl Commandable for MotionDetector {
    fn execute(&self, command: &Command) -> Result<(), HausbusError> {
        match command {
            Command::Reset => Ok(()),
            other => Err(unsupported(&self.inner.id, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::FakeInput;

    fn detector() -> (MotionDetector, Arc<FakeInput>) {
        let input = Arc::new(FakeInput::default());
        input.set(BinaryState::High);
        let detector = MotionDetector::new(
            ComponentId::new("motion").unwrap(),
            input.as_ref(),
            Settings::default(),
        );
        (detector, input)
    }

    fn count(trigger: &Trigger) -> (Arc<AtomicUsize>, Subscription) {
        let counter = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&counter);
        let subscription = trigger.attach(move || {
            sink.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (counter, subscription)
    }

    #[test]
    fn should_detect_motion_when_input_goes_low() {
        let (detector, input) = detector();
        let (detected, _subscription) = count(detector.motion_detected_trigger());

        input.set(BinaryState::Low);

        assert_eq!(detected.load(Ordering::SeqCst), 1);
        assert_eq!(detector.state(), MotionDetectionState::MotionDetected);
    }

    #[test]
    fn should_complete_detection_when_input_returns_high() {
        let (detector, input) = detector();
        let (completed, _subscription) = count(detector.detection_completed_trigger());

        input.set(BinaryState::Low);
        input.set(BinaryState::High);

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(detector.state(), MotionDetectionState::Idle);
    }

    #[test]
    fn should_report_disabled_and_stay_silent_when_disabled() {
        let (detector, input) = detector();
        let (detected, _subscription) = count(detector.motion_detected_trigger());
        detector.settings().update(|settings| settings.is_enabled = false);

        input.set(BinaryState::Low);

        assert_eq!(detected.load(Ordering::SeqCst), 0);
        assert!(detector.status().has(MotionDetectionState::Disabled));
    }

    #[test]
    fn should_report_sensed_state_when_enabled_again() {
        let (detector, input) = detector();
        detector.settings().update(|settings| settings.is_enabled = false);
        input.set(BinaryState::Low);

        detector.settings().update(|settings| settings.is_enabled = true);

        assert_eq!(detector.state(), MotionDetectionState::MotionDetected);
    }

    #[test]
    fn should_notify_status_listener_when_disabled() {
        let (detector, _input) = detector();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = detector.on_status_changed(Arc::new(
            move |_old: &ComponentStatus, new: &ComponentStatus| {
                sink.lock().unwrap().push(new.clone());
            },
        ));

        detector.settings().update(|settings| settings.is_enabled = false);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ComponentStatus::new().with(MotionDetectionState::Disabled)]
        );
    }
}
