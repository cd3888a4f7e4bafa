use std::time::{Duration, Instant};

/// Debounced occupancy signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Occupancy {
    #[default]
    Idle,
    Occupied(usize),
}

impl Occupancy {
    pub fn zone(&self) -> Option<usize> {
        match self {
            Occupancy::Idle => None,
            Occupancy::Occupied(zone) => Some(*zone),
        }
    }

    /// Integer carried on the wire: the zone id, or `-1` when idle.
    pub fn wire_value(&self) -> i32 {
        match self {
            Occupancy::Idle => -1,
            Occupancy::Occupied(zone) => i32::try_from(*zone).unwrap_or(i32::MAX),
        }
    }
}

impl From<Option<usize>> for Occupancy {
    fn from(zone: Option<usize>) -> Self {
        zone.map_or(Occupancy::Idle, Occupancy::Occupied)
    }
}

/// Presence-sensor state machine with an idle timeout.
///
/// Time is passed in explicitly so the machine has no clock of its own; the
/// runtime tracker feeds it `Instant::now()` and tests feed it virtual time.
///
/// Every zone hit restarts the idle window. Only a full `idle_timeout` with no
/// hit moves an occupied machine back to idle. The timer auto-resets, so it
/// keeps expiring every period while idle, but those expiries never produce a
/// transition.
#[derive(Clone, Debug)]
pub struct OccupancyMachine {
    occupancy: Occupancy,
    idle_timeout: Duration,
    deadline: Instant,
    last_refresh: Option<Instant>,
    expiries: u64,
}

impl OccupancyMachine {
    pub fn new(idle_timeout: Duration, now: Instant) -> Self {
        Self {
            occupancy: Occupancy::Idle,
            idle_timeout,
            deadline: now + idle_timeout,
            last_refresh: None,
            expiries: 0,
        }
    }

    pub fn occupancy(&self) -> Occupancy {
        self.occupancy
    }

    /// Instant at which the idle timer next fires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Number of timer expiries so far, including no-op ones while idle.
    pub fn expiries(&self) -> u64 {
        self.expiries
    }

    /// A qualifying detection landed in `zone`.
    ///
    /// Returns the new occupancy when it changed.
    pub fn on_zone_hit(&mut self, zone: usize, now: Instant) -> Option<Occupancy> {
        self.last_refresh = Some(now);
        self.deadline = now + self.idle_timeout;

        let next = Occupancy::Occupied(zone);
        if self.occupancy == next {
            return None;
        }
        self.occupancy = next;
        Some(next)
    }

    /// Fire the idle timer if its deadline has been reached.
    ///
    /// Returns `Some(Occupancy::Idle)` only on the occupied-to-idle edge.
    pub fn on_tick(&mut self, now: Instant) -> Option<Occupancy> {
        if now < self.deadline {
            return None;
        }
        self.expiries += 1;
        self.deadline = now + self.idle_timeout;

        match self.occupancy {
            Occupancy::Idle => None,
            Occupancy::Occupied(_) => {
                self.occupancy = Occupancy::Idle;
                Some(Occupancy::Idle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(8000);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_idle() {
        let t0 = Instant::now();
        let machine = OccupancyMachine::new(T, t0);
        assert_eq!(machine.occupancy(), Occupancy::Idle);
        assert_eq!(machine.deadline(), t0 + T);
        assert!(machine.last_refresh().is_none());
    }

    #[test]
    fn repeated_hits_in_same_zone_do_not_flicker() {
        let t0 = Instant::now();
        let mut machine = OccupancyMachine::new(T, t0);
        let mut sent = Vec::new();

        sent.extend(machine.on_zone_hit(0, t0));
        sent.extend(machine.on_tick(t0 + ms(4000)));
        sent.extend(machine.on_zone_hit(0, t0 + ms(4000)));
        sent.extend(machine.on_tick(t0 + ms(8000)));
        sent.extend(machine.on_tick(t0 + ms(11_999)));
        assert_eq!(sent, vec![Occupancy::Occupied(0)]);

        sent.extend(machine.on_tick(t0 + ms(12_000)));
        assert_eq!(sent, vec![Occupancy::Occupied(0), Occupancy::Idle]);
    }

    #[test]
    fn idle_expiry_is_idempotent() {
        let t0 = Instant::now();
        let mut machine = OccupancyMachine::new(T, t0);
        assert_eq!(machine.on_zone_hit(1, t0), Some(Occupancy::Occupied(1)));

        assert_eq!(machine.on_tick(t0 + ms(8000)), Some(Occupancy::Idle));
        assert_eq!(machine.on_tick(t0 + ms(16_000)), None);
        assert_eq!(machine.expiries(), 2);
        assert_eq!(machine.occupancy(), Occupancy::Idle);
    }

    #[test]
    fn expiry_while_never_occupied_is_silent() {
        let t0 = Instant::now();
        let mut machine = OccupancyMachine::new(T, t0);
        assert_eq!(machine.on_tick(t0 + T), None);
        assert_eq!(machine.expiries(), 1);
        assert_eq!(machine.deadline(), t0 + T + T);
    }

    #[test]
    fn zone_change_broadcasts_and_resets_timer() {
        let t0 = Instant::now();
        let mut machine = OccupancyMachine::new(T, t0);

        assert_eq!(machine.on_zone_hit(0, t0), Some(Occupancy::Occupied(0)));
        assert_eq!(
            machine.on_zone_hit(2, t0 + ms(3000)),
            Some(Occupancy::Occupied(2))
        );
        assert_eq!(machine.deadline(), t0 + ms(11_000));
        assert_eq!(machine.last_refresh(), Some(t0 + ms(3000)));

        assert_eq!(machine.on_tick(t0 + ms(10_999)), None);
        assert_eq!(machine.on_tick(t0 + ms(11_000)), Some(Occupancy::Idle));
    }

    #[test]
    fn reentering_after_idle_broadcasts_again() {
        let t0 = Instant::now();
        let mut machine = OccupancyMachine::new(T, t0);
        machine.on_zone_hit(0, t0);
        machine.on_tick(t0 + T);
        assert_eq!(
            machine.on_zone_hit(0, t0 + ms(9000)),
            Some(Occupancy::Occupied(0))
        );
    }

    #[test]
    fn wire_values() {
        assert_eq!(Occupancy::Idle.wire_value(), -1);
        assert_eq!(Occupancy::Occupied(2).wire_value(), 2);
        assert_eq!(Occupancy::from(None), Occupancy::Idle);
        assert_eq!(Occupancy::from(Some(3)).zone(), Some(3));
    }
}
