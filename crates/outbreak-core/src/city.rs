use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Collision half-extent used when validating player spawn points.
pub const PLAYER_RADIUS: f32 = 10.0;

/// A solid, axis-aligned building footprint. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Building {
    fn new(name: &str, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            name: name.to_string(),
            x,
            y,
            width,
            height,
        }
    }

    /// Strict overlap test against a square of half-extent `radius` centred on `(x, y)`.
    pub fn overlaps(&self, x: f32, y: f32, radius: f32) -> bool {
        x - radius < self.x + self.width
            && x + radius > self.x
            && y - radius < self.y + self.height
            && y + radius > self.y
    }
}

/// Sidewalk spawn points shared by players and NPC batches.
const SPAWN_POINTS: [Point; 17] = [
    Point::new(150.0, 200.0),
    Point::new(350.0, 200.0),
    Point::new(550.0, 200.0),
    Point::new(750.0, 200.0),
    Point::new(150.0, 400.0),
    Point::new(350.0, 400.0),
    Point::new(550.0, 400.0),
    Point::new(750.0, 400.0),
    Point::new(220.0, 100.0),
    Point::new(220.0, 300.0),
    Point::new(220.0, 500.0),
    Point::new(420.0, 100.0),
    Point::new(420.0, 300.0),
    Point::new(420.0, 500.0),
    Point::new(620.0, 100.0),
    Point::new(620.0, 300.0),
    Point::new(620.0, 500.0),
];

/// Navigation nodes along roads, intersections and parks.
fn default_waypoints() -> Vec<Point> {
    let mut nodes = Vec::with_capacity(80);
    let road_columns = [
        50.0, 120.0, 180.0, 260.0, 320.0, 380.0, 460.0, 520.0, 580.0, 660.0, 720.0, 780.0,
    ];
    for y in [200.0, 400.0] {
        nodes.extend(road_columns.iter().map(|&x| Point::new(x, y)));
    }
    let road_rows = [
        30.0, 80.0, 130.0, 170.0, 230.0, 280.0, 320.0, 370.0, 430.0, 480.0, 530.0, 580.0,
    ];
    for x in [220.0, 420.0, 620.0] {
        nodes.extend(road_rows.iter().map(|&y| Point::new(x, y)));
    }
    nodes.extend([
        // parks
        Point::new(90.0, 340.0),
        Point::new(320.0, 360.0),
        Point::new(520.0, 340.0),
        Point::new(715.0, 350.0),
        // intersections
        Point::new(220.0, 200.0),
        Point::new(420.0, 200.0),
        Point::new(620.0, 200.0),
        Point::new(220.0, 400.0),
        Point::new(420.0, 400.0),
        Point::new(620.0, 400.0),
    ]);
    nodes
}

fn default_buildings() -> Vec<Building> {
    vec![
        // North district
        Building::new("City Hall", 20.0, 20.0, 150.0, 120.0),
        Building::new("Police Station", 260.0, 30.0, 100.0, 110.0),
        Building::new("Fire Department", 460.0, 40.0, 110.0, 100.0),
        Building::new("Hospital", 660.0, 25.0, 120.0, 115.0),
        // Residential
        Building::new("Apartment A", 30.0, 250.0, 80.0, 90.0),
        Building::new("House 1", 120.0, 260.0, 60.0, 80.0),
        Building::new("House 2", 260.0, 240.0, 70.0, 100.0),
        Building::new("House 3", 340.0, 250.0, 40.0, 90.0),
        // Commercial
        Building::new("Shopping Mall", 460.0, 240.0, 110.0, 110.0),
        Building::new("Coffee Shop", 660.0, 250.0, 60.0, 80.0),
        Building::new("Bakery", 730.0, 260.0, 50.0, 70.0),
        // Industrial
        Building::new("Factory", 40.0, 450.0, 130.0, 130.0),
        Building::new("Warehouse", 260.0, 460.0, 100.0, 110.0),
        Building::new("Power Plant", 460.0, 450.0, 110.0, 120.0),
        Building::new("Recycling Center", 660.0, 470.0, 120.0, 100.0),
    ]
}

/// Read-only obstacle map: building footprints plus the fixed spawn and
/// navigation point sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityMap {
    pub buildings: Vec<Building>,
    pub spawn_points: Vec<Point>,
    pub waypoints: Vec<Point>,
}

impl Default for CityMap {
    fn default() -> Self {
        Self {
            buildings: default_buildings(),
            spawn_points: SPAWN_POINTS.to_vec(),
            waypoints: default_waypoints(),
        }
    }
}

impl CityMap {
    /// A map with no buildings, handy for isolating movement in tests.
    pub fn open() -> Self {
        Self {
            buildings: Vec::new(),
            ..Self::default()
        }
    }

    pub fn check_collision(&self, x: f32, y: f32, radius: f32) -> bool {
        self.buildings.iter().any(|b| b.overlaps(x, y, radius))
    }

    pub fn collides(&self, p: Point, radius: f32) -> bool {
        self.check_collision(p.x, p.y, radius)
    }

    /// Spawn points that are clear of every building at player size.
    pub fn valid_spawn_points(&self) -> Vec<Point> {
        self.spawn_points
            .iter()
            .copied()
            .filter(|p| !self.collides(*p, PLAYER_RADIUS))
            .collect()
    }

    /// Sample the segment `from → to` at `samples` evenly spaced points
    /// (start excluded, end included). True when none of them collide.
    pub fn path_clear(&self, from: Point, to: Point, samples: u32, radius: f32) -> bool {
        let samples = samples.max(1);
        (1..=samples).all(|i| {
            let t = i as f32 / samples as f32;
            !self.collides(from.lerp(to, t), radius)
        })
    }

    pub fn building_at(&self, p: Point) -> Option<&Building> {
        self.buildings.iter().find(|b| b.overlaps(p.x, p.y, 0.0))
    }
}
