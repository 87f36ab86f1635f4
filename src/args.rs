use clap::Parser;

/// This is a blind A/B preference survey over a dataset of questions and responses.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file with the settings of the survey: column names, limits and
    /// export names. See the manual of the ab_session crate for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory, default .abtest) Where the session id, the progress and the results are saved
    /// between runs.
    #[clap(long, value_parser, default_value = ".abtest")]
    pub store_dir: String,

    /// (file path, optional) A CSV, XLSX or XLS dataset to load when the program starts.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (en or zh) The preset of column names to look for in the dataset. Overrides the preset of
    /// the configuration file.
    #[clap(long, value_parser)]
    pub columns: Option<String>,

    /// (number, optional) Seeds the shuffling of the options, for reproducible runs.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    /// (directory, default the current directory) Where the exports are written.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
