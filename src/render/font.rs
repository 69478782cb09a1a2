use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use plotters::style::{register_font, FontStyle};

static SANS: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
static SANS_BOLD: &[u8] = include_bytes!("../../assets/DejaVuSans-Bold.ttf");

// The ab_glyph backend has no system font lookup, so the faces are bundled
// and registered once per process.
static REGISTERED: Lazy<bool> = Lazy::new(|| {
    register_font("sans-serif", FontStyle::Normal, SANS).is_ok()
        && register_font("sans-serif", FontStyle::Bold, SANS_BOLD).is_ok()
});

pub fn ensure_fonts() -> Result<()> {
    if *REGISTERED {
        Ok(())
    } else {
        Err(anyhow!("bundled fonts failed to register"))
    }
}
