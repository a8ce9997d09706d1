pub(crate) use crate::{
    PortTrackError,
    brand::OutputParser,
    channel::{CommandOutput, Row},
};

pub(crate) use tracing::{debug, trace, warn};

pub(crate) use regex::Regex;
