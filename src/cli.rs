use clap::Parser;

/// sldprt2stl - batch-convert SOLIDWORKS parts to STL
#[derive(Parser, Debug)]
#[command(name = "sldprt2stl")]
#[command(about = "Batch-convert SOLIDWORKS part files (.SLDPRT) to STL using an installed SOLIDWORKS")]
#[command(version)]
pub struct Cli {
    /// Directory containing the .SLDPRT files (skips the input prompt)
    pub input_dir: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
