//! Format layer creation macros

/// Build a text fmt layer (`pretty` or `compact`) with the display options applied
macro_rules! create_fmt_layer {
    ($format:ident, $display:expr) => {
        tracing_subscriber::fmt::layer()
            .$format()
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids)
            .with_thread_names($display.thread_names)
    };
}

/// JSON layer (has additional options)
macro_rules! create_json_layer {
    ($display:expr) => {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .flatten_event($display.flatten)
            .with_ansi(false)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids)
            .with_thread_names($display.thread_names)
    };
}

/// Finish a layer: pick the writer, drop timestamps when disabled, box it
macro_rules! finish_layer {
    ($layer:expr, $display:expr, $writer:expr) => {{
        let layer = $layer;
        match ($writer, $display.time) {
            (Writer::Stderr, true) => layer.with_writer(std::io::stderr).boxed(),
            (Writer::Stderr, false) => layer.with_writer(std::io::stderr).without_time().boxed(),
            (Writer::Stdout, true) => layer.with_writer(std::io::stdout).boxed(),
            (Writer::Stdout, false) => layer.with_writer(std::io::stdout).without_time().boxed(),
            (Writer::Test, true) => layer.with_test_writer().boxed(),
            (Writer::Test, false) => layer.with_test_writer().without_time().boxed(),
        }
    }};
}
