use serde::{Deserialize, Serialize};

/// A transform run over the composed buffer before it is sent.
/// All channel numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessKind {
    /// Scale a channel range by a percentage
    Dim {
        start: usize,
        channels: usize,
        percent: u8,
    },
    /// Force a channel range to a fixed value
    Set {
        start: usize,
        channels: usize,
        value: u8,
    },
    /// Copy a channel range to another location
    Remap {
        from: usize,
        to: usize,
        channels: usize,
    },
    /// Reverse the order of 3 channel nodes
    Reverse { start: usize, nodes: usize },
    /// Reorder the colour channels of RGB nodes, e.g. "GRB"
    ColourOrder {
        start: usize,
        nodes: usize,
        order: String,
    },
    /// Skip a failed channel by shifting the following channels along
    DeadChannel { channel: usize, channels: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputProcess {
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ProcessKind,
}

fn default_enabled() -> bool {
    true
}

/// 0-based range clamped to the buffer
fn region(buffer_len: usize, start: usize, channels: usize) -> Option<std::ops::Range<usize>> {
    let begin = start.checked_sub(1)?;
    if begin >= buffer_len {
        return None;
    }
    Some(begin..(begin + channels).min(buffer_len))
}

fn colour_index(c: char) -> Option<usize> {
    match c.to_ascii_uppercase() {
        'R' => Some(0),
        'G' => Some(1),
        'B' => Some(2),
        _ => None,
    }
}

impl OutputProcess {
    pub fn new(kind: ProcessKind) -> Self {
        Self {
            description: String::new(),
            enabled: true,
            kind,
        }
    }

    /// First and last channel this process touches
    pub fn channel_range(&self) -> (usize, usize) {
        match &self.kind {
            ProcessKind::Dim { start, channels, .. } | ProcessKind::Set { start, channels, .. } => {
                (*start, start + channels.saturating_sub(1))
            }
            ProcessKind::Remap { from, to, channels } => {
                let low = *from.min(to);
                (low, from.max(to) + channels.saturating_sub(1))
            }
            ProcessKind::Reverse { start, nodes } | ProcessKind::ColourOrder { start, nodes, .. } => {
                (*start, start + (nodes * 3).saturating_sub(1))
            }
            ProcessKind::DeadChannel { channel, channels } => {
                (*channel, channel + channels.saturating_sub(1))
            }
        }
    }

    pub fn apply(&self, buffer: &mut [u8]) {
        if !self.enabled {
            return;
        }

        let len = buffer.len();
        match &self.kind {
            ProcessKind::Dim {
                start,
                channels,
                percent,
            } => {
                if let Some(r) = region(len, *start, *channels) {
                    let percent = (*percent).min(100) as u16;
                    for b in &mut buffer[r] {
                        *b = (*b as u16 * percent / 100) as u8;
                    }
                }
            }
            ProcessKind::Set {
                start,
                channels,
                value,
            } => {
                if let Some(r) = region(len, *start, *channels) {
                    buffer[r].fill(*value);
                }
            }
            ProcessKind::Remap { from, to, channels } => {
                let (Some(src), Some(dst)) = (region(len, *from, *channels), region(len, *to, *channels))
                else {
                    return;
                };
                let count = src.len().min(dst.len());
                let copy = buffer[src.start..src.start + count].to_vec();
                buffer[dst.start..dst.start + count].copy_from_slice(&copy);
            }
            ProcessKind::Reverse { start, nodes } => {
                if let Some(r) = region(len, *start, nodes * 3) {
                    let whole = r.len() / 3 * 3;
                    let nodes: Vec<[u8; 3]> = buffer[r.start..r.start + whole]
                        .chunks_exact(3)
                        .rev()
                        .map(|n| [n[0], n[1], n[2]])
                        .collect();
                    for (i, node) in nodes.iter().enumerate() {
                        let at = r.start + i * 3;
                        buffer[at..at + 3].copy_from_slice(node);
                    }
                }
            }
            ProcessKind::ColourOrder {
                start,
                nodes,
                order,
            } => {
                let indices: Vec<usize> = order.chars().filter_map(colour_index).collect();
                if indices.len() != 3 {
                    return;
                }
                if let Some(r) = region(len, *start, nodes * 3) {
                    let whole = r.len() / 3 * 3;
                    for node in buffer[r.start..r.start + whole].chunks_exact_mut(3) {
                        let rgb = [node[0], node[1], node[2]];
                        for (k, &i) in indices.iter().enumerate() {
                            node[k] = rgb[i];
                        }
                    }
                }
            }
            ProcessKind::DeadChannel { channel, channels } => {
                if let Some(r) = region(len, *channel, *channels) {
                    if r.len() > 1 {
                        buffer.copy_within(r.start..r.end - 1, r.start + 1);
                    }
                    buffer[r.start] = 0;
                }
            }
        }
    }
}
