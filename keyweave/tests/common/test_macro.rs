// Run a key sequence against an engine and check the keyboard reports.
//
// Each sequence entry is `[key id, pressed, delay in ms before the event]`,
// each expected report is `[modifier byte, keycodes]`.
#[macro_export]
macro_rules! key_sequence_test {
    (engine: $engine:expr, sequence: [$([$id:expr, $pressed:expr, $delay:expr]),* $(,)?], expected_reports: [$([$modifier:expr, $keys:expr]),* $(,)?]) => {{
        let mut engine = $engine;
        let sequence = vec![
            $(
                $crate::common::TestKeyPress {
                    id: $id,
                    pressed: $pressed,
                    delay: $delay,
                },
            )*
        ];
        let expected_reports: Vec<(u8, [u8; 6])> = vec![
            $(
                ($modifier, $keys),
            )*
        ];
        $crate::common::run_key_sequence_test(&mut engine, &sequence, &expected_reports);
    }};
}
