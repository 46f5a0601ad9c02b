/// The `<?xml ...?>` prologue written ahead of an envelope.
#[derive(Debug, Clone)]
pub struct Declaration {
    version: String,
    encoding: String,
}

impl Declaration {
    pub fn new(version: impl Into<String>, encoding: impl Into<String>) -> Self {
        Declaration {
            version: version.into(),
            encoding: encoding.into(),
        }
    }

    pub fn write<W: std::io::Write>(&self, w: &mut W) -> std::io::Result<()> {
        write!(
            w,
            r#"<?xml version="{}" encoding="{}"?>"#,
            self.version, self.encoding
        )
    }
}
