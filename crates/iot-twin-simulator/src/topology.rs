use serde::Serialize;
use std::net::Ipv4Addr;
use std::time::Duration;

const SPEED_OF_LIGHT_M_PER_S: f64 = 299_792_458.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// One-way propagation delay of a radio signal between two positions.
    pub fn propagation_delay(&self, other: &Position) -> Duration {
        Duration::from_secs_f64(self.distance_to(other) / SPEED_OF_LIGHT_M_PER_S)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub address: Ipv4Addr,
    pub position: Position,
}

/// Row-first grid placement of nodes with constant spacing.
#[derive(Debug, Clone, Copy)]
pub struct GridLayout {
    pub min_x: f64,
    pub min_y: f64,
    pub delta_x: f64,
    pub delta_y: f64,
    pub width: u32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            delta_x: 25.5,
            delta_y: 25.0,
            width: 3,
        }
    }
}

impl GridLayout {
    pub fn position(&self, index: u32) -> Position {
        let width = self.width.max(1);
        Position {
            x: self.min_x + self.delta_x * (index % width) as f64,
            y: self.min_y + self.delta_y * (index / width) as f64,
        }
    }
}

/// Consecutive host addresses inside 10.1.1.0/24, starting at .1.
pub fn host_address(index: u32) -> Ipv4Addr {
    let host = index + 1;
    Ipv4Addr::new(10, 1, 1 + (host / 256) as u8, (host % 256) as u8)
}
