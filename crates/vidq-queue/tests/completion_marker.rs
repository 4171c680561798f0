use anyhow::Result;

use vidq_queue::queue::BoundedQueue;
use vidq_queue::shutdown::send_completion_marker;
use vidq_queue::types::{Message, QueueState};

fn collect(q: &BoundedQueue<Message<u32>>) -> Vec<Message<u32>> {
    let mut out = Vec::new();
    while let Ok(m) = q.try_get() {
        q.task_done().ok();
        out.push(m);
    }
    out
}

#[test]
fn full_capacity_two_queue_ends_with_marker() -> Result<()> {
    let q = BoundedQueue::new(2)?;
    q.try_put(Message::Item(1))
        .map_err(|_| anyhow::anyhow!("put 1"))?;
    q.try_put(Message::Item(2))
        .map_err(|_| anyhow::anyhow!("put 2"))?;

    let report = send_completion_marker(&q, "cap2");
    assert!(report.evicted <= 2);
    assert_eq!(report.evicted, 1);

    let contents = collect(&q);
    assert_eq!(contents, vec![Message::Item(2), Message::Stop]);
    assert_eq!(q.metrics().evicted_total.get(), 1);
    Ok(())
}

#[test]
fn marker_is_present_for_every_fill_level() -> Result<()> {
    for capacity in 1..=8usize {
        for fill in 0..=capacity {
            let q = BoundedQueue::new(capacity)?;
            for i in 0..fill {
                q.try_put(Message::Item(i as u32))
                    .map_err(|_| anyhow::anyhow!("queue unexpectedly full"))?;
            }
            let report = send_completion_marker(&q, "grid");
            assert!(report.evicted as usize <= capacity);

            let contents = collect(&q);
            assert_eq!(contents.last(), Some(&Message::Stop));
            assert_eq!(contents.len() + report.evicted as usize, fill + 1);
            // Survivors keep FIFO order: the oldest items were the ones evicted.
            let survivors: Vec<u32> = contents
                .into_iter()
                .filter_map(Message::into_item)
                .collect();
            let expected: Vec<u32> = (report.evicted as u32..fill as u32).collect();
            assert_eq!(survivors, expected);
        }
    }
    Ok(())
}

#[test]
fn evicted_items_do_not_block_join() -> Result<()> {
    let q = BoundedQueue::new(3)?;
    for i in 0..3 {
        q.try_put(Message::Item(i))
            .map_err(|_| anyhow::anyhow!("put"))?;
    }
    send_completion_marker(&q, "join");
    assert_eq!(q.state(), QueueState::Closing);

    // Only the three survivors (two items + marker) are outstanding.
    assert_eq!(q.unfinished_tasks(), 3);
    let consumer = {
        let q = q.clone();
        std::thread::spawn(move || {
            let mut seen = 0u32;
            loop {
                let Ok(m) = q.get(None) else { continue };
                q.task_done().ok();
                if m.is_stop() {
                    break;
                }
                seen += 1;
            }
            seen
        })
    };
    q.join();
    let seen = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("consumer panicked"))?;
    assert_eq!(seen, 2);
    Ok(())
}
