use std::collections::VecDeque;

use crate::error::{HydroError, Result};

/// Velocities of every body at one simulation time.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRecord {
    pub time: f64,
    /// 6-DOF velocity per body `[n_bodies][6]`
    pub velocities: Vec<[f64; 6]>,
}

/// Velocity history for the radiation convolution, newest record first.
#[derive(Clone, Debug, Default)]
pub struct HistoryBuffer {
    records: VecDeque<HistoryRecord>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn newest(&self) -> Option<&HistoryRecord> {
        self.records.front()
    }

    pub fn oldest(&self) -> Option<&HistoryRecord> {
        self.records.back()
    }

    /// Time of the record at `idx` (0 is the newest).
    #[inline]
    pub fn time(&self, idx: usize) -> f64 {
        self.records[idx].time
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    /// Records a new sample. Pushing the time of the newest record again is an error.
    pub fn push(&mut self, record: HistoryRecord) -> Result<()> {
        if let Some(newest) = self.records.front() {
            if newest.time == record.time {
                return Err(HydroError::DuplicateStep { time: record.time });
            }
        }
        self.records.push_front(record);
        Ok(())
    }

    /// Removes and returns the newest record.
    pub fn pop_newest(&mut self) -> Option<HistoryRecord> {
        self.records.pop_front()
    }

    /// Drops old records while the second-oldest one is still older than
    /// `min_time`, so one record at or before `min_time` is kept for interpolation.
    pub fn prune(&mut self, min_time: f64) {
        while self.records.len() > 1 && self.records[self.records.len() - 2].time < min_time {
            self.records.pop_back();
        }
    }

    /// Interpolates velocities at `query` between the records at `newer` and
    /// `newer + 1`, writing them to `out`.
    ///
    /// Exact matches return the stored sample unmodified.
    pub fn interpolate_into(
        &self,
        newer: usize,
        query: f64,
        out: &mut Vec<[f64; 6]>,
    ) -> Result<()> {
        let n = self.records.len();
        if newer + 1 >= n {
            return Err(HydroError::out_of_range("history", newer + 1, n));
        }
        let (rec_newer, rec_older) = (&self.records[newer], &self.records[newer + 1]);
        let (t_newer, t_older) = (rec_newer.time, rec_older.time);

        out.clear();
        if query == t_newer {
            out.extend_from_slice(&rec_newer.velocities);
        } else if query == t_older {
            out.extend_from_slice(&rec_older.velocities);
        } else if query > t_older && query < t_newer {
            let w_older = (t_newer - query) / (t_newer - t_older);
            let w_newer = 1. - w_older;
            out.extend(
                rec_newer
                    .velocities
                    .iter()
                    .zip(rec_older.velocities.iter())
                    .map(|(vn, vo)| {
                        let mut v = [0.; 6];
                        v.iter_mut()
                            .enumerate()
                            .for_each(|(i, vi)| *vi = w_older * vo[i] + w_newer * vn[i]);
                        v
                    }),
            );
        } else {
            return Err(HydroError::NotBracketed {
                query,
                newer: t_newer,
                older: t_older,
            });
        }
        Ok(())
    }

    /// Returns the velocities at `query` anywhere within the stored time range.
    pub fn velocity_at(&self, query: f64) -> Result<Vec<[f64; 6]>> {
        let mut out = vec![];
        match self.records.len() {
            0 => Err(HydroError::out_of_range("history", 0, 0)),
            1 if self.records[0].time == query => Ok(self.records[0].velocities.clone()),
            1 => Err(HydroError::NotBracketed {
                query,
                newer: self.records[0].time,
                older: self.records[0].time,
            }),
            n => {
                let newer = (0..n - 1)
                    .find(|&i| self.records[i + 1].time <= query)
                    .unwrap_or(n - 2);
                self.interpolate_into(newer, query, &mut out)?;
                Ok(out)
            }
        }
    }
}
