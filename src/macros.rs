// Colours are only applied when stdout is a terminal, so piped output stays plain.
macro_rules! paint {
    ($colour:expr, $($arg:tt)*) => (
        {
            use atty::Stream;
            if atty::is(Stream::Stdout) {
                format!("{}", $colour.paint($($arg)*))
            } else {
                format!("{}", $($arg)*)
            }
        }
    )
}

#[allow(unused_macros)]
macro_rules! green {
    ($($arg:tt)*) => (paint!(ansi_term::Colour::Green.bold(), $($arg)*))
}

#[allow(unused_macros)]
macro_rules! red {
    ($($arg:tt)*) => (paint!(ansi_term::Colour::Red.bold(), $($arg)*))
}

#[allow(unused_macros)]
macro_rules! yellow {
    ($($arg:tt)*) => (paint!(ansi_term::Colour::Yellow.bold(), $($arg)*))
}

#[allow(unused_macros)]
macro_rules! blue {
    ($($arg:tt)*) => (paint!(ansi_term::Colour::Cyan.bold(), $($arg)*))
}
