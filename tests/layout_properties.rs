use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dashboard::{layout, CanvasSpec, LayoutError, Rect, Size, Slot, Widget};

const CANVAS: Size = Size::new(400, 300);

fn random_slots(rng: &mut StdRng) -> Vec<Slot> {
    let count = rng.gen_range(1..=6);
    (0..count)
        .map(|i| {
            let width = rng.gen_range(1..=160);
            let height = rng.gen_range(1..=120);
            let x = rng.gen_range(0..=CANVAS.width - width);
            let y = rng.gen_range(0..=CANVAS.height - height);
            Slot::new(format!("w{}", i), Rect::new(x, y, width, height))
        })
        .collect()
}

fn brute_force_overlap(slots: &[Slot]) -> bool {
    for (i, a) in slots.iter().enumerate() {
        for b in &slots[i + 1..] {
            let (a, b) = (a.rect(), b.rect());
            let xs = a.x.max(b.x) < (a.x + a.width).min(b.x + b.width);
            let ys = a.y.max(b.y) < (a.y + a.height).min(b.y + b.height);
            if xs && ys {
                return true;
            }
        }
    }
    false
}

fn widgets_for(slots: &[Slot], rng: &mut StdRng) -> Vec<Widget> {
    slots
        .iter()
        .map(|s| {
            let size = Size::new(rng.gen_range(1..=s.width), rng.gen_range(1..=s.height));
            Widget::vector(s.name.clone(), size, String::new())
        })
        .collect()
}

#[test]
fn placements_never_overlap() {
    let mut rng = StdRng::seed_from_u64(0x5eed_1a70);
    let (mut valid, mut rejected) = (0, 0);

    for _ in 0..500 {
        let slots = random_slots(&mut rng);
        let canvas = CanvasSpec::new(CANVAS, (255, 255, 255, 255), slots.clone());
        let overlapping = brute_force_overlap(&slots);

        match canvas.validate() {
            Ok(()) => {
                assert!(!overlapping, "validate accepted overlapping slots {:?}", slots);
                valid += 1;

                let widgets = widgets_for(&slots, &mut rng);
                let surface = layout(&widgets, &canvas).expect("fitting widgets must lay out");
                let placements = surface.placements();
                assert_eq!(placements.len(), widgets.len());
                for (i, p) in placements.iter().enumerate() {
                    assert!(p.rect.within(CANVAS));
                    assert_eq!(p.rect.size(), p.widget.size);
                    for q in &placements[i + 1..] {
                        assert!(!p.rect.intersects(&q.rect), "{:?} overlaps {:?}", p.rect, q.rect);
                    }
                }
                assert_eq!(layout(&widgets, &canvas), Ok(surface));
            }
            Err(LayoutError::Overlap { .. }) => {
                assert!(overlapping, "validate rejected disjoint slots {:?}", slots);
                rejected += 1;
            }
            Err(other) => panic!("unexpected error {:?} for {:?}", other, slots),
        }
    }

    // Make sure both branches were exercised
    assert!(valid > 20 && rejected > 20, "valid={} rejected={}", valid, rejected);
}

#[test]
fn oversize_is_detected_in_either_dimension() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let slots = random_slots(&mut rng);
        let canvas = CanvasSpec::new(CANVAS, (0, 0, 0, 255), slots.clone());
        let slot = &slots[0];
        let grow_width = rng.gen_bool(0.5);
        let size = if grow_width {
            Size::new(slot.width + rng.gen_range(1..=10), slot.height)
        } else {
            Size::new(slot.width, slot.height + rng.gen_range(1..=10))
        };
        let widget = Widget::vector(slot.name.clone(), size, String::new());
        assert_eq!(
            layout(&[widget], &canvas),
            Err(LayoutError::OversizeWidget {
                widget: slot.name.clone(),
                natural: size,
                slot: slot.rect().size(),
            })
        );
    }
}
