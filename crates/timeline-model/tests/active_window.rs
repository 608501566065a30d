use proptest::prelude::*;

use splice_timeline_model::{
    active_effects, demux_window, effect_padding, media_time_at, Effect, EffectId,
    SessionSnapshot, Transition, TransitionKind,
};

fn adjacent_pair(
    a_len: f64,
    b_len: f64,
    incoming_ms: f64,
    outgoing_ms: f64,
) -> SessionSnapshot {
    let mut snap = SessionSnapshot::new(1, 25.0);
    snap.effects
        .push(Effect::video("a", "ha", 0, 0.0, 0.0, a_len, a_len + 1_000.0));
    snap.effects
        .push(Effect::video("b", "hb", 0, a_len, 500.0, 500.0 + b_len, b_len + 1_000.0));
    snap.transitions.push(Transition {
        id: "ab".to_string(),
        kind: TransitionKind::CrossFade,
        outgoing: EffectId::new("a"),
        incoming: EffectId::new("b"),
        incoming_ms,
        outgoing_ms,
    });
    snap
}

proptest! {
    #[test]
    fn active_iff_inside_padded_window(
        a_len in 100.0f64..5_000.0,
        b_len in 100.0f64..5_000.0,
        pad_in in 0.0f64..100.0,
        pad_out in 0.0f64..100.0,
        t in -500.0f64..12_000.0,
    ) {
        let snap = adjacent_pair(a_len, b_len, pad_in, pad_out);
        let active: Vec<EffectId> = active_effects(&snap, t).iter().map(|e| e.id.clone()).collect();

        let a_active = t >= 0.0 && t <= a_len + pad_out;
        let b_active = t >= a_len - pad_in && t <= a_len + ((500.0 + b_len) - 500.0);

        prop_assert_eq!(active.contains(&EffectId::new("a")), a_active);
        prop_assert_eq!(active.contains(&EffectId::new("b")), b_active);
    }

    #[test]
    fn active_media_time_stays_inside_demux_window(
        a_len in 100.0f64..5_000.0,
        b_len in 100.0f64..5_000.0,
        pad_in in 0.0f64..100.0,
        pad_out in 0.0f64..100.0,
        t in 0.0f64..12_000.0,
    ) {
        let snap = adjacent_pair(a_len, b_len, pad_in, pad_out);
        for effect in active_effects(&snap, t) {
            let window = demux_window(effect, effect_padding(&snap, &effect.id));
            let media = media_time_at(effect, t);
            prop_assert!(
                media >= window.start_ms - 1e-6 && media <= window.end_ms + 1e-6,
                "{} at {} -> {} outside {:?}",
                effect.id,
                t,
                media,
                window
            );
        }
    }

    #[test]
    fn result_is_ordered_by_track(
        tracks in proptest::collection::vec(0usize..4, 1..12),
        t in 0.0f64..1_000.0,
    ) {
        let mut snap = SessionSnapshot::new(4, 30.0);
        for (i, track) in tracks.iter().enumerate() {
            snap.effects.push(Effect::video(
                format!("e{i}"),
                "h",
                *track,
                (i as f64) * 10.0,
                0.0,
                2_000.0,
                2_000.0,
            ));
        }
        let active = active_effects(&snap, t);
        for pair in active.windows(2) {
            prop_assert!(pair[0].track <= pair[1].track);
            if pair[0].track == pair[1].track {
                prop_assert!(pair[0].start_at_position <= pair[1].start_at_position);
            }
        }
    }
}
