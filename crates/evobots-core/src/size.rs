use crate::EvoBotsConfig;

/// Precomputed food ↔ size mapping so growth and hunger shrink are O(1).
///
/// Size follows `base + (max - base) * (1 - exp(-food / scale))`, rounded and
/// clamped to `[min_size, max_size]`.
#[derive(Debug, Clone)]
pub struct SizeTable {
    food_to_size: Vec<u32>,
    size_to_food: Vec<u32>,
    min_size: u32,
}

impl SizeTable {
    #[must_use]
    pub fn new(config: &EvoBotsConfig) -> Self {
        let base = config.default_size as f32;
        let max = config.max_size as f32;
        let scale = config.food_size_scale;
        let food_to_size: Vec<u32> = (0..=config.max_table_food)
            .map(|food| {
                let size = base + (max - base) * (1.0 - (-(food as f32) / scale).exp());
                (size.round() as u32).clamp(config.min_size, config.max_size)
            })
            .collect();

        let last = food_to_size.len() as u32 - 1;
        let size_to_food = (0..=config.max_size)
            .map(|size| {
                let idx = food_to_size.partition_point(|&s| s < size);
                (idx as u32).min(last)
            })
            .collect();

        Self {
            food_to_size,
            size_to_food,
            min_size: config.min_size,
        }
    }

    /// Size reached from table position `food`, saturating at the table end.
    #[must_use]
    pub fn size_for_food(&self, food: u32) -> u32 {
        let idx = (food as usize).min(self.food_to_size.len() - 1);
        self.food_to_size[idx]
    }

    /// Smallest table position whose size is at least `size`.
    #[must_use]
    pub fn food_for_size(&self, size: u32) -> u32 {
        let idx = (size as usize).min(self.size_to_food.len() - 1);
        self.size_to_food[idx]
    }

    /// Size after eating `food` more units; never shrinks.
    #[must_use]
    pub fn grow(&self, size: u32, food: u32) -> u32 {
        let target = self.size_for_food(self.food_for_size(size).saturating_add(food));
        target.max(size)
    }

    /// Size after one hunger step; never grows.
    #[must_use]
    pub fn shrink(&self, size: u32) -> u32 {
        let target = self.size_for_food(self.food_for_size(size).saturating_sub(1));
        target.min(size).max(self.min_size)
    }

    #[must_use]
    pub fn max_size(&self) -> u32 {
        (self.size_to_food.len() - 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SizeTable {
        SizeTable::new(&EvoBotsConfig::default())
    }

    #[test]
    fn table_starts_at_default_size_and_is_monotonic() {
        let table = table();
        assert_eq!(table.size_for_food(0), 10);
        let mut previous = 0;
        for food in 0..=400 {
            let size = table.size_for_food(food);
            assert!(size >= previous);
            assert!(size <= 100);
            previous = size;
        }
        assert_eq!(table.size_for_food(10_000), table.size_for_food(400));
    }

    #[test]
    fn growth_increases_size_at_small_sizes() {
        let table = table();
        let grown = table.grow(10, 1);
        assert!(grown > 10, "one food should grow a default agent, got {grown}");
        assert!(table.grow(grown, 3) > grown);
        assert_eq!(table.grow(100, 5), 100);
    }

    #[test]
    fn shrink_undoes_growth_and_respects_minimum() {
        let table = table();
        let grown = table.grow(10, 1);
        assert_eq!(table.shrink(grown), 10);
        assert_eq!(table.shrink(10), 10);
        assert_eq!(table.shrink(4), 4);
        assert!(table.shrink(60) < 60);
    }

    #[test]
    fn small_children_grow_back_to_table() {
        let table = table();
        assert_eq!(table.food_for_size(5), 0);
        assert!(table.grow(5, 1) > 10);
    }
}
