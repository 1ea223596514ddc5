/// SQLite row shapes, one per table read back as a unit.
/// Tags and timestamps stay as text here; `queries` turns them into the
/// typed sest-types models.

pub struct ChannelRow {
    pub id: i64,
    pub owner: String,
    pub title: String,
    pub description: String,
    pub write_key: String,
    pub max_fields: u16,
    pub last_update: String,
    pub notification_target: Option<String>,
    pub target_owner: Option<String>,
}

pub struct RuleRow {
    pub id: i64,
    pub channel_id: i64,
    pub condition_op: String,
    pub field_no: u16,
    pub value: String,
    pub value_optional: Option<String>,
    pub action: String,
}

pub struct RecordRow {
    pub id: i64,
    pub channel_id: i64,
    pub insertion_time: String,
}
