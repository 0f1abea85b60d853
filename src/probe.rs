//! Edge counter for checking the sensor is alive before capturing.

use crate::parallel::sampler::SignalPort;
use crate::pins::SyncPolarity;
use log::info;

/// Active edges seen on each sync signal.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EdgeCounts {
    pub pixel_clock: u32,
    pub line_sync: u32,
    pub frame_sync: u32,
}

impl EdgeCounts {
    /// Whether every signal toggled at least once.
    pub fn all_active(&self) -> bool {
        self.pixel_clock > 0 && self.line_sync > 0 && self.frame_sync > 0
    }
}

/// Take `samples` snapshots from `port` and count the active edges of each sync signal
/// between consecutive snapshots.
pub fn count_edges<P: SignalPort>(
    port: &mut P,
    polarity: &SyncPolarity,
    samples: u32,
) -> Result<EdgeCounts, P::Error> {
    let mut counts = EdgeCounts::default();
    if samples == 0 {
        return Ok(counts);
    }

    let mut previous = port.sample()?;
    for _ in 1..samples {
        let current = port.sample()?;
        if polarity
            .pixel_clock
            .is_edge(previous.pixel_clock, current.pixel_clock)
        {
            counts.pixel_clock += 1;
        }
        if polarity.line_sync.is_edge(previous.line_sync, current.line_sync) {
            counts.line_sync += 1;
        }
        if polarity
            .frame_sync
            .is_edge(previous.frame_sync, current.frame_sync)
        {
            counts.frame_sync += 1;
        }
        previous = current;
    }

    info!(
        "PCLK {} edges, HREF {} edges, VSYNC {} edges",
        counts.pixel_clock, counts.line_sync, counts.frame_sync
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{PortFault, Waveform};
    use crate::pins::Edge;

    #[test]
    fn test_counts_each_signal() {
        let mut port = Waveform::new()
            .frame_start()
            .line(&[1, 2, 3])
            .line(&[4, 5])
            .idle(2)
            .into_port();

        let counts = count_edges(&mut port, &SyncPolarity::default(), 100).expect("counts");
        assert_eq!(
            counts,
            EdgeCounts {
                pixel_clock: 5,
                line_sync: 2,
                frame_sync: 1,
            }
        );
        assert!(counts.all_active());
        assert_eq!(port.position(), 100);
    }

    #[test]
    fn test_quiet_sensor() {
        let mut port = Waveform::new().idle(10).into_port();
        let counts = count_edges(&mut port, &SyncPolarity::default(), 50).expect("counts");
        assert_eq!(counts, EdgeCounts::default());
        assert!(!counts.all_active());
    }

    #[test]
    fn test_falling_polarity() {
        let polarity = SyncPolarity {
            frame_sync: Edge::Falling,
            ..SyncPolarity::default()
        };
        let mut port = Waveform::with_polarity(polarity)
            .idle(1)
            .frame_start()
            .frame_start()
            .into_port();

        let counts = count_edges(&mut port, &polarity, 20).expect("counts");
        assert_eq!(counts.frame_sync, 2);

        // Read with the wrong polarity the release edges are counted instead
        let mut port = Waveform::with_polarity(polarity)
            .idle(1)
            .frame_start()
            .into_port();
        let counts = count_edges(&mut port, &SyncPolarity::default(), 20).expect("counts");
        assert_eq!(counts.frame_sync, 1);
    }

    #[test]
    fn test_zero_samples() {
        let mut port = Waveform::new().into_port();
        let counts = count_edges(&mut port, &SyncPolarity::default(), 0).expect("counts");
        assert_eq!(counts, EdgeCounts::default());
        assert_eq!(port.position(), 0);
    }

    #[test]
    fn test_port_error() {
        let mut port = Waveform::new().idle(5).into_port().fail_at(3);
        assert_eq!(
            count_edges(&mut port, &SyncPolarity::default(), 10),
            Err(PortFault)
        );
    }
}
