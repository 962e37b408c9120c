use crate::signal::SubscriptionId;
use crate::unit::UnitAttributes;
use crate::value::Observable;
use parking_lot::RwLock;
use std::sync::Arc;

/// What a health bar widget needs to draw itself.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthBarState {
    /// Filled share of the bar, `current / max`.
    pub fraction: f32,
    /// Text shown on the bar, e.g. `"80/100"`.
    pub label: String,
    /// Horizontal offset that keeps the fill left-aligned in a centred bar.
    pub offset: f32,
}

impl HealthBarState {
    fn compute(health: f32, max: f32) -> Self {
        let fraction = if max > 0.0 { health / max } else { 0.0 };
        Self {
            fraction,
            label: format!("{health:.0}/{max:.0}"),
            offset: -(1.0 - fraction) / 2.0,
        }
    }
}

/// Presentation model of a unit's health bar.
///
/// Max health is read once, when the bar is attached. The bar then follows
/// current health through its value signal, re-reading it on every
/// notification, so a value corrected by another listener is what gets shown.
/// Dropping the bar unsubscribes it.
pub struct HealthBar {
    current_hp: Observable<f32>,
    subscription: SubscriptionId,
    state: Arc<RwLock<HealthBarState>>,
}

impl HealthBar {
    /// Attach a bar to `unit`.
    pub fn attach(unit: &UnitAttributes) -> Self {
        // Max health is a built-in attribute, so the lookup cannot fail
        let max = unit.max_hp().map(|v| v.get() as f32).unwrap_or_default();
        let current_hp = unit.current_hp().clone();

        let state = Arc::new(RwLock::new(HealthBarState::compute(current_hp.get(), max)));
        let sink = state.clone();
        let subscription = current_hp.value_changed().subscribe(move |hp| {
            *sink.write() = HealthBarState::compute(hp.get(), max);
        });

        Self {
            current_hp,
            subscription,
            state,
        }
    }

    /// Latest computed state.
    pub fn state(&self) -> HealthBarState {
        self.state.read().clone()
    }
}

impl Drop for HealthBar {
    fn drop(&mut self) {
        self.current_hp.value_changed().unsubscribe(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_current_health() {
        let unit = UnitAttributes::with_health(100.0, 100);
        let bar = HealthBar::attach(&unit);
        assert_eq!(bar.state().fraction, 1.0);
        assert_eq!(bar.state().label, "100/100");
        assert_eq!(bar.state().offset, 0.0);

        unit.current_hp().set(50.0);
        assert_eq!(
            bar.state(),
            HealthBarState {
                fraction: 0.5,
                label: "50/100".into(),
                offset: -0.25,
            }
        );
    }

    #[test]
    fn max_health_is_read_once() {
        let unit = UnitAttributes::with_health(50.0, 100);
        let bar = HealthBar::attach(&unit);

        unit.max_hp().unwrap().set(200);
        unit.current_hp().set(100.0);
        assert_eq!(bar.state().fraction, 1.0);
    }

    #[test]
    fn zero_max_health_shows_empty_bar() {
        let unit = UnitAttributes::new();
        let bar = HealthBar::attach(&unit);
        assert_eq!(bar.state().fraction, 0.0);
        assert_eq!(bar.state().label, "0/0");
    }

    #[test]
    fn dropping_the_bar_unsubscribes() {
        let unit = UnitAttributes::with_health(10.0, 10);
        let bar = HealthBar::attach(&unit);
        assert_eq!(unit.current_hp().value_changed().listener_count(), 1);

        drop(bar);
        assert_eq!(unit.current_hp().value_changed().listener_count(), 0);
    }

    #[test]
    fn shows_health_clamped_by_an_earlier_listener() {
        let unit = UnitAttributes::with_health(100.0, 100);
        {
            let hp = unit.current_hp().clone();
            unit.current_hp().on_changed(move |v| {
                if *v > 100.0 {
                    hp.set(100.0);
                }
            });
        }
        let bar = HealthBar::attach(&unit);

        unit.current_hp().set(150.0);

        assert_eq!(unit.current_hp().get(), 100.0);
        assert_eq!(bar.state().label, "100/100");
        assert_eq!(bar.state().fraction, 1.0);
    }
}
