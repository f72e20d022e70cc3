/// Message sent from the fixture progress callback to the render thread
#[derive(Clone, Debug)]
pub enum ProgressMessage {
    /// Percentage boundary crossed while inserting an entity's rows
    Percent { entity: String, percent: u8 },
    Exit,
}
